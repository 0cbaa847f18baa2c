//! Hub -> terminal commands (§6 of the design: the closed set of
//! server-initiated verbs).
//!
//! Unlike inbound parsing, these are plain data the hub constructs itself,
//! so a tagged `serde` enum is the right tool -- there is no ambiguity to
//! resolve at deserialize time because the hub never deserializes its own
//! commands back.

use serde::Serialize;

use crate::types::{AdminLevel, BackupType};

/// One `(enrollid, name)` pair inside a `setusername` batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserNameEntry {
    pub enrollid: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum OutboundCommand {
    #[serde(rename = "getuserlist")]
    GetUserList { stn: i64 },

    #[serde(rename = "getuserinfo")]
    GetUserInfo { enrollid: i64, backupnum: u8 },

    #[serde(rename = "setuserinfo")]
    SetUserInfo {
        enrollid: i64,
        name: String,
        backupnum: u8,
        admin: u8,
        record: String,
    },

    #[serde(rename = "deleteuser")]
    DeleteUser { enrollid: i64, backupnum: u8 },

    #[serde(rename = "enableuser")]
    EnableUser { enrollid: i64, enflag: bool },

    #[serde(rename = "setusername")]
    SetUserName { count: usize, record: Vec<UserNameEntry> },

    #[serde(rename = "opendoor")]
    OpenDoor { door: i64, delay: i64 },

    #[serde(rename = "settime")]
    SetTime { cloudtime: String },

    #[serde(rename = "gettime")]
    GetTime {},

    #[serde(rename = "getnewlog")]
    GetNewLog { stn: i64 },

    #[serde(rename = "getalllog")]
    GetAllLog { stn: i64 },

    #[serde(rename = "cleanlog")]
    CleanLog {},

    #[serde(rename = "cleanuser")]
    CleanUser {},

    #[serde(rename = "reboot")]
    Reboot {},

    #[serde(rename = "getdevinfo")]
    GetDevInfo {},
}

impl OutboundCommand {
    pub fn set_user_info(
        enrollid: i64,
        name: impl Into<String>,
        backupnum: BackupType,
        admin: AdminLevel,
        record: impl Into<String>,
    ) -> Self {
        OutboundCommand::SetUserInfo {
            enrollid,
            name: name.into(),
            backupnum: backupnum.value(),
            admin: admin.value(),
            record: record.into(),
        }
    }

    pub fn delete_user(enrollid: i64, backupnum: BackupType) -> Self {
        OutboundCommand::DeleteUser { enrollid, backupnum: backupnum.value() }
    }

    pub fn set_user_name_batch(entries: Vec<UserNameEntry>) -> Self {
        OutboundCommand::SetUserName { count: entries.len(), record: entries }
    }

    /// Serialize to the compact JSON text sent as the WebSocket frame body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("OutboundCommand always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_door_serializes_with_cmd_tag() {
        let cmd = OutboundCommand::OpenDoor { door: 1, delay: 5 };
        let json = cmd.to_json();
        assert_eq!(json, r#"{"cmd":"opendoor","door":1,"delay":5}"#);
    }

    #[test]
    fn set_user_name_batch_carries_count() {
        let cmd = OutboundCommand::set_user_name_batch(vec![
            UserNameEntry { enrollid: 1, name: "A".into() },
            UserNameEntry { enrollid: 2, name: "B".into() },
        ]);
        match cmd {
            OutboundCommand::SetUserName { count, .. } => assert_eq!(count, 2),
            _ => panic!("expected SetUserName"),
        }
    }

    #[test]
    fn zero_arg_commands_serialize_without_extra_fields() {
        assert_eq!(OutboundCommand::Reboot {}.to_json(), r#"{"cmd":"reboot"}"#);
        assert_eq!(OutboundCommand::GetTime {}.to_json(), r#"{"cmd":"gettime"}"#);
    }
}
