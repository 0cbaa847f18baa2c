//! Closed-set wire enums shared by several TM20 commands.

use crate::error::ProtocolError;

/// A credential slot category (`backupnum` on the wire).
///
/// The valid set is `{0..11, 12, 13, 20..27, 30..37, 50}`. 12 and 13 are
/// group-delete pseudo-values (all fingerprints / all credentials) and are
/// only meaningful on `deleteuser`; elsewhere they are rejected by callers
/// that expect a single credential slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupType(u8);

impl BackupType {
    pub const PASSWORD: BackupType = BackupType(10);
    pub const RFID: BackupType = BackupType(11);
    pub const ALL_FINGERPRINTS: BackupType = BackupType(12);
    pub const ALL_CREDENTIALS: BackupType = BackupType(13);
    pub const PHOTO: BackupType = BackupType(50);

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_fingerprint(self) -> bool {
        (0..=9).contains(&self.0)
    }

    pub fn is_face(self) -> bool {
        (20..=27).contains(&self.0)
    }

    pub fn is_palm(self) -> bool {
        (30..=37).contains(&self.0)
    }

    pub fn is_group_delete(self) -> bool {
        self.0 == 12 || self.0 == 13
    }
}

impl TryFrom<u8> for BackupType {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        let valid = matches!(raw, 0..=13 | 20..=27 | 30..=37 | 50);
        if valid {
            Ok(BackupType(raw))
        } else {
            Err(ProtocolError::OutOfRange {
                field: "backupnum",
                value: raw.to_string(),
            })
        }
    }
}

impl TryFrom<i64> for BackupType {
    type Error = ProtocolError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .map_err(|_| ProtocolError::OutOfRange {
                field: "backupnum",
                value: raw.to_string(),
            })
            .and_then(BackupType::try_from)
    }
}

/// Admin level carried on `senduser`: `0` (user), `1` (enroller), `2` (admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminLevel(u8);

impl AdminLevel {
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for AdminLevel {
    type Error = ProtocolError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 | 1 | 2 => Ok(AdminLevel(raw as u8)),
            _ => Err(ProtocolError::OutOfRange {
                field: "admin",
                value: raw.to_string(),
            }),
        }
    }
}

/// Verify method reported on a `sendlog` record (`mode` on the wire).
///
/// Unlike `BackupType`, new firmware can introduce verify modes the hub has
/// never seen; the wire value is preserved verbatim rather than rejected.
/// Named constructors exist for the documented set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyMode(pub i64);

impl VerifyMode {
    pub const FINGERPRINT: VerifyMode = VerifyMode(0);
    pub const CARD: VerifyMode = VerifyMode(1);
    pub const PASSWORD: VerifyMode = VerifyMode(2);
    pub const CARD_ALT: VerifyMode = VerifyMode(3);
    pub const FACE: VerifyMode = VerifyMode(8);
    pub const QRCODE: VerifyMode = VerifyMode(13);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_type_accepts_documented_ranges() {
        assert!(BackupType::try_from(0u8).is_ok());
        assert!(BackupType::try_from(9u8).is_ok());
        assert!(BackupType::try_from(10u8).is_ok());
        assert!(BackupType::try_from(13u8).is_ok());
        assert!(BackupType::try_from(20u8).is_ok());
        assert!(BackupType::try_from(27u8).is_ok());
        assert!(BackupType::try_from(30u8).is_ok());
        assert!(BackupType::try_from(37u8).is_ok());
        assert!(BackupType::try_from(50u8).is_ok());
    }

    #[test]
    fn backup_type_rejects_gaps() {
        assert!(BackupType::try_from(14u8).is_err());
        assert!(BackupType::try_from(28u8).is_err());
        assert!(BackupType::try_from(38u8).is_err());
        assert!(BackupType::try_from(51u8).is_err());
    }

    #[test]
    fn admin_level_rejects_out_of_range() {
        assert!(AdminLevel::try_from(3i64).is_err());
        assert!(AdminLevel::try_from(-1i64).is_err());
        assert!(AdminLevel::try_from(2i64).is_ok());
    }
}
