//! Access decision logic for attendance punches (§4.2.2): allow unless the
//! user is disabled or the punch falls outside their configured validity
//! window.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    DeniedDisabled,
    DeniedOutsideWindow,
    DeniedUnknownUser,
}

impl AccessDecision {
    pub fn is_granted(self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

pub struct UserAccessInfo {
    pub is_enabled: bool,
    pub starttime: Option<DateTime<Utc>>,
    pub endtime: Option<DateTime<Utc>>,
}

pub fn decide(user: Option<&UserAccessInfo>, punch_time: DateTime<Utc>) -> AccessDecision {
    let Some(user) = user else {
        return AccessDecision::DeniedUnknownUser;
    };
    if !user.is_enabled {
        return AccessDecision::DeniedDisabled;
    }
    if let Some(start) = user.starttime {
        if punch_time < start {
            return AccessDecision::DeniedOutsideWindow;
        }
    }
    if let Some(end) = user.endtime {
        if punch_time > end {
            return AccessDecision::DeniedOutsideWindow;
        }
    }
    AccessDecision::Granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn unknown_user_is_denied() {
        assert_eq!(decide(None, at(2026, 1, 1)), AccessDecision::DeniedUnknownUser);
    }

    #[test]
    fn disabled_user_is_denied_regardless_of_window() {
        let user = UserAccessInfo { is_enabled: false, starttime: None, endtime: None };
        assert_eq!(decide(Some(&user), at(2026, 1, 1)), AccessDecision::DeniedDisabled);
    }

    #[test]
    fn punch_before_starttime_is_denied() {
        let user = UserAccessInfo { is_enabled: true, starttime: Some(at(2026, 6, 1)), endtime: None };
        assert_eq!(decide(Some(&user), at(2026, 1, 1)), AccessDecision::DeniedOutsideWindow);
    }

    #[test]
    fn punch_after_endtime_is_denied() {
        let user = UserAccessInfo { is_enabled: true, starttime: None, endtime: Some(at(2026, 1, 1)) };
        assert_eq!(decide(Some(&user), at(2026, 6, 1)), AccessDecision::DeniedOutsideWindow);
    }

    #[test]
    fn punch_within_window_is_granted() {
        let user = UserAccessInfo { is_enabled: true, starttime: Some(at(2026, 1, 1)), endtime: Some(at(2026, 12, 31)) };
        assert_eq!(decide(Some(&user), at(2026, 6, 1)), AccessDecision::Granted);
    }

    #[test]
    fn no_window_configured_is_granted_when_enabled() {
        let user = UserAccessInfo { is_enabled: true, starttime: None, endtime: None };
        assert_eq!(decide(Some(&user), at(2026, 6, 1)), AccessDecision::Granted);
    }
}
