//! Terminal -> hub commands (`cmd` frames) and their parsing.
//!
//! TM20 frames are JSON objects with exactly one of `cmd`/`ret` at the root.
//! Parsing is hand-written rather than a single `#[serde(tag = ...)]` enum
//! because the tag lives under two different keys depending on direction,
//! and several fields need validation beyond what `Deserialize` expresses
//! (closed sets, non-negative bounds, length bounds).

use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{AdminLevel, BackupType};

/// Device info carried on `reg`. Every `*size` field, if present, must be a
/// non-negative integer; unknown fields are ignored rather than rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevInfo {
    pub modelname: Option<String>,
    pub usersize: Option<i64>,
    pub fpsize: Option<i64>,
    pub cardsize: Option<i64>,
    pub logsize: Option<i64>,
    pub firmware: Option<String>,
    pub mac: Option<String>,
}

/// A `reg` command.
#[derive(Debug, Clone, PartialEq)]
pub struct RegMessage {
    pub sn: String,
    pub cpusn: Option<String>,
    pub devinfo: DevInfo,
}

/// One entry in a `sendlog.record` array.
///
/// `inout` is parsed but deliberately not trusted by the attendance handler
/// (§4.2.2 of the hub's design) -- it is carried here only so callers that
/// want to log the raw device claim can see it.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub enrollid: i64,
    pub time: String,
    pub mode: Option<i64>,
    pub inout: Option<i64>,
    pub event: Option<i64>,
    pub temperature: Option<f64>,
    pub image: Option<String>,
}

/// A `sendlog` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SendLogMessage {
    pub sn: String,
    pub count: Option<i64>,
    pub logindex: Option<i64>,
    pub record: Vec<LogRecord>,
}

/// A `senduser` command: one user plus one credential slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SendUserMessage {
    pub sn: String,
    pub enrollid: i64,
    pub name: Option<String>,
    pub admin: AdminLevel,
    pub backupnum: BackupType,
    /// Opaque credential payload, stored verbatim.
    pub record: String,
    pub group: Option<i64>,
    pub starttime: Option<String>,
    pub endtime: Option<String>,
}

/// A `sendqrcode` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SendQrCodeMessage {
    pub sn: String,
    pub record: String,
}

/// Any of the four inbound command verbs, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandFrame {
    Reg(RegMessage),
    SendLog(SendLogMessage),
    SendUser(SendUserMessage),
    SendQrCode(SendQrCodeMessage),
}

impl CommandFrame {
    pub fn sn(&self) -> &str {
        match self {
            CommandFrame::Reg(m) => &m.sn,
            CommandFrame::SendLog(m) => &m.sn,
            CommandFrame::SendUser(m) => &m.sn,
            CommandFrame::SendQrCode(m) => &m.sn,
        }
    }
}

/// Parse a raw text frame into a [`CommandFrame`].
///
/// Only inbound (terminal -> hub) verbs are accepted here; a frame whose
/// root key is `ret` should be routed to the response handler instead of
/// passed to this function.
pub fn parse_command(text: &str) -> Result<CommandFrame, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    let obj = value.as_object().ok_or_else(|| {
        ProtocolError::MalformedJson("root is not a JSON object".to_string())
    })?;
    let cmd = obj
        .get("cmd")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingVerb)?;
    match cmd {
        "reg" => parse_reg(obj).map(CommandFrame::Reg),
        "sendlog" => parse_sendlog(obj).map(CommandFrame::SendLog),
        "senduser" => parse_senduser(obj).map(CommandFrame::SendUser),
        "sendqrcode" => parse_sendqrcode(obj).map(CommandFrame::SendQrCode),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

/// True if the frame's root key is `ret` rather than `cmd` (a response frame).
pub fn is_response_frame(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.as_object().map(|o| o.contains_key("ret")))
        .unwrap_or(false)
}

fn required_str<'a>(obj: &'a serde_json::Map<String, Value>, field: &'static str) -> Result<&'a str, ProtocolError> {
    obj.get(field)
        .ok_or(ProtocolError::MissingField(field))?
        .as_str()
        .ok_or(ProtocolError::WrongType { field, expected: "a string" })
}

fn required_i64(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<i64, ProtocolError> {
    obj.get(field)
        .ok_or(ProtocolError::MissingField(field))?
        .as_i64()
        .ok_or(ProtocolError::WrongType { field, expected: "an integer" })
}

fn optional_str(obj: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_owned)
}

fn optional_i64(obj: &serde_json::Map<String, Value>, field: &str) -> Option<i64> {
    obj.get(field).and_then(Value::as_i64)
}

fn optional_f64(obj: &serde_json::Map<String, Value>, field: &str) -> Option<f64> {
    obj.get(field).and_then(Value::as_f64)
}

fn non_negative(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<i64>, ProtocolError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n)),
            Some(n) => Err(ProtocolError::OutOfRange { field, value: n.to_string() }),
            None => Err(ProtocolError::WrongType { field, expected: "a non-negative integer" }),
        },
    }
}

fn parse_reg(obj: &serde_json::Map<String, Value>) -> Result<RegMessage, ProtocolError> {
    let sn = required_str(obj, "sn")?;
    if !(5..=50).contains(&sn.len()) {
        return Err(ProtocolError::OutOfRange { field: "sn", value: sn.to_string() });
    }
    let cpusn = optional_str(obj, "cpusn");
    let devinfo = match obj.get("devinfo").and_then(Value::as_object) {
        Some(d) => DevInfo {
            modelname: optional_str(d, "modelname"),
            usersize: non_negative(d, "usersize")?,
            fpsize: non_negative(d, "fpsize")?,
            cardsize: non_negative(d, "cardsize")?,
            logsize: non_negative(d, "logsize")?,
            firmware: optional_str(d, "firmware"),
            mac: optional_str(d, "mac"),
        },
        None => DevInfo::default(),
    };
    Ok(RegMessage { sn: sn.to_string(), cpusn, devinfo })
}

fn parse_sendlog(obj: &serde_json::Map<String, Value>) -> Result<SendLogMessage, ProtocolError> {
    let sn = required_str(obj, "sn")?.to_string();
    let count = optional_i64(obj, "count");
    let logindex = optional_i64(obj, "logindex");
    let raw_records = obj
        .get("record")
        .ok_or(ProtocolError::MissingField("record"))?
        .as_array()
        .ok_or(ProtocolError::WrongType { field: "record", expected: "an array" })?;
    let mut record = Vec::with_capacity(raw_records.len());
    for entry in raw_records {
        let entry = entry
            .as_object()
            .ok_or(ProtocolError::WrongType { field: "record[]", expected: "an object" })?;
        let enrollid = required_i64(entry, "enrollid")?;
        let time = required_str(entry, "time")?.to_string();
        record.push(LogRecord {
            enrollid,
            time,
            mode: optional_i64(entry, "mode"),
            inout: optional_i64(entry, "inout"),
            event: optional_i64(entry, "event"),
            temperature: optional_f64(entry, "temperature"),
            image: optional_str(entry, "image"),
        });
    }
    // A count/len mismatch is logged by the caller, not rejected here.
    Ok(SendLogMessage { sn, count, logindex, record })
}

fn parse_senduser(obj: &serde_json::Map<String, Value>) -> Result<SendUserMessage, ProtocolError> {
    let sn = required_str(obj, "sn")?.to_string();
    let enrollid = required_i64(obj, "enrollid")?;
    if enrollid < 0 {
        return Err(ProtocolError::OutOfRange { field: "enrollid", value: enrollid.to_string() });
    }
    let backupnum = required_i64(obj, "backupnum")?;
    let backupnum = BackupType::try_from(backupnum)?;
    let admin = optional_i64(obj, "admin").unwrap_or(0);
    let admin = AdminLevel::try_from(admin)?;
    let record = optional_str(obj, "record").unwrap_or_default();
    Ok(SendUserMessage {
        sn,
        enrollid,
        name: optional_str(obj, "name"),
        admin,
        backupnum,
        record,
        group: optional_i64(obj, "group"),
        starttime: optional_str(obj, "starttime"),
        endtime: optional_str(obj, "endtime"),
    })
}

fn parse_sendqrcode(obj: &serde_json::Map<String, Value>) -> Result<SendQrCodeMessage, ProtocolError> {
    let sn = required_str(obj, "sn")?.to_string();
    let record = obj.get("record").ok_or(ProtocolError::MissingField("record"))?;
    let record = match record {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(ProtocolError::WrongType { field: "record", expected: "a non-empty value" });
        }
    };
    Ok(SendQrCodeMessage { sn, record })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reg() {
        let frame = parse_command(
            r#"{"cmd":"reg","sn":"TM20-001","cpusn":"C1","devinfo":{"modelname":"TM20","usersize":3000,"fpsize":3000,"logsize":100000,"firmware":"v2.4","mac":"AA:BB:CC"}}"#,
        )
        .unwrap();
        match frame {
            CommandFrame::Reg(m) => {
                assert_eq!(m.sn, "TM20-001");
                assert_eq!(m.devinfo.usersize, Some(3000));
            }
            _ => panic!("expected Reg"),
        }
    }

    #[test]
    fn rejects_short_sn() {
        let err = parse_command(r#"{"cmd":"reg","sn":"ab"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::OutOfRange { field: "sn", value: "ab".to_string() });
    }

    #[test]
    fn rejects_negative_devinfo_size() {
        let err = parse_command(
            r#"{"cmd":"reg","sn":"TM20-001","devinfo":{"usersize":-1}}"#,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::OutOfRange { field: "usersize", value: "-1".to_string() });
    }

    #[test]
    fn parses_sendlog_with_count_mismatch_tolerated() {
        let frame = parse_command(
            r#"{"cmd":"sendlog","sn":"TM20-001","count":5,"logindex":1,"record":[{"enrollid":7,"time":"2024-01-02 08:00:00","mode":0,"inout":0}]}"#,
        )
        .unwrap();
        match frame {
            CommandFrame::SendLog(m) => {
                assert_eq!(m.count, Some(5));
                assert_eq!(m.record.len(), 1);
            }
            _ => panic!("expected SendLog"),
        }
    }

    #[test]
    fn rejects_sendlog_missing_record() {
        let err = parse_command(r#"{"cmd":"sendlog","sn":"TM20-001"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("record"));
    }

    #[test]
    fn parses_senduser_backupnum_bounds() {
        let frame = parse_command(
            r#"{"cmd":"senduser","sn":"TM20-001","enrollid":7,"name":"Jane","admin":1,"backupnum":0,"record":"deadbeef"}"#,
        )
        .unwrap();
        match frame {
            CommandFrame::SendUser(m) => {
                assert_eq!(m.backupnum.value(), 0);
                assert_eq!(m.admin.value(), 1);
            }
            _ => panic!("expected SendUser"),
        }
    }

    #[test]
    fn rejects_senduser_invalid_backupnum() {
        let err = parse_command(
            r#"{"cmd":"senduser","sn":"TM20-001","enrollid":7,"backupnum":99,"record":""}"#,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::OutOfRange { field: "backupnum", value: "99".to_string() });
    }

    #[test]
    fn parses_sendqrcode() {
        let frame =
            parse_command(r#"{"cmd":"sendqrcode","sn":"TM20-001","record":"12345"}"#).unwrap();
        match frame {
            CommandFrame::SendQrCode(m) => assert_eq!(m.record, "12345"),
            _ => panic!("expected SendQrCode"),
        }
    }

    #[test]
    fn rejects_unknown_command() {
        let err = parse_command(r#"{"cmd":"frobnicate","sn":"TM20-001"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownCommand("frobnicate".to_string()));
    }

    #[test]
    fn rejects_missing_verb() {
        let err = parse_command(r#"{"sn":"TM20-001"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MissingVerb);
    }

    #[test]
    fn response_frame_is_not_a_command() {
        assert!(is_response_frame(r#"{"ret":"reg","result":true}"#));
        assert!(!is_response_frame(r#"{"cmd":"reg","sn":"TM20-001"}"#));
    }
}
