//! Hub -> terminal responses (`ret` frames), built as raw JSON values.
//!
//! A `json!` builder, not a derived struct, is the right tool here because
//! `reason` is a string on `reg` but an integer on `sendlog`, and optional
//! fields like `nosenduser` only ever appear on success. Mirrors the
//! `error_json`/`heartbeat_json` helpers this crate's sibling session code
//! builds on.

use serde_json::{json, Value};

pub fn reg_success(cloudtime: &str) -> Value {
    json!({
        "ret": "reg",
        "result": true,
        "cloudtime": cloudtime,
        "nosenduser": true,
    })
}

pub fn reg_rejected(reason: &str) -> Value {
    json!({
        "ret": "reg",
        "result": false,
        "reason": reason,
    })
}

pub fn sendlog_success(count: usize, logindex: Option<i64>, cloudtime: &str, access: u8) -> Value {
    json!({
        "ret": "sendlog",
        "result": true,
        "count": count,
        "logindex": logindex,
        "cloudtime": cloudtime,
        "access": access,
    })
}

pub fn sendlog_failure(reason: i64) -> Value {
    json!({
        "ret": "sendlog",
        "result": false,
        "reason": reason,
    })
}

pub fn senduser_success(cloudtime: &str) -> Value {
    json!({
        "ret": "senduser",
        "result": true,
        "cloudtime": cloudtime,
    })
}

pub fn senduser_failure(reason: i64) -> Value {
    json!({
        "ret": "senduser",
        "result": false,
        "reason": reason,
    })
}

pub fn sendqrcode_granted(enrollid: i64, username: &str, message: &str) -> Value {
    json!({
        "ret": "sendqrcode",
        "result": true,
        "access": 1,
        "enrollid": enrollid,
        "username": username,
        "message": message,
    })
}

pub fn sendqrcode_denied(message: &str) -> Value {
    json!({
        "ret": "sendqrcode",
        "result": true,
        "access": 0,
        "message": message,
    })
}

/// Render the server's current local time in the protocol's wire format:
/// naive `YYYY-MM-DD HH:MM:SS`.
pub fn format_cloudtime(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn to_text(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_success_has_expected_shape() {
        let v = reg_success("2024-01-02 08:00:00");
        assert_eq!(v["ret"], "reg");
        assert_eq!(v["result"], true);
        assert_eq!(v["nosenduser"], true);
    }

    #[test]
    fn sendlog_failure_reason_is_numeric() {
        let v = sendlog_failure(1);
        assert_eq!(v["reason"], 1);
        assert!(v["reason"].is_number());
    }

    #[test]
    fn sendqrcode_denied_has_zero_access_and_no_enrollid() {
        let v = sendqrcode_denied("not found");
        assert_eq!(v["access"], 0);
        assert!(v.get("enrollid").is_none());
    }

    #[test]
    fn format_cloudtime_is_naive_local_format() {
        use chrono::TimeZone;
        let t = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        assert_eq!(format_cloudtime(t), "2024-01-02 08:00:00");
    }
}
