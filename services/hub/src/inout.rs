//! Server-inferred in/out flip (§4.2.2, Open Question C.1): the terminal's
//! own `inout` field is informational only. The hub decides in/out
//! exclusively from each user's last recorded state within a rolling
//! session window -- the first punch of a new window is always `in`, and
//! the field flips on every subsequent punch within the window.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

pub const IN: i16 = 0;
pub const OUT: i16 = 1;

pub struct LastPunch {
    pub inout: i16,
    pub punch_time: DateTime<Utc>,
}

/// Given the user's last punch (if any) and the configured session
/// window, decides whether this new punch is an `in` or an `out`.
pub fn infer_inout(last: Option<&LastPunch>, now: DateTime<Utc>, session_window: std::time::Duration) -> i16 {
    let Some(last) = last else {
        return IN;
    };
    let window = ChronoDuration::from_std(session_window).unwrap_or_else(|_| ChronoDuration::hours(18));
    if now - last.punch_time > window {
        IN
    } else if last.inout == IN {
        OUT
    } else {
        IN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn window() -> Duration {
        Duration::from_secs(18 * 3600)
    }

    #[test]
    fn first_punch_ever_is_in() {
        assert_eq!(infer_inout(None, Utc::now(), window()), IN);
    }

    #[test]
    fn punch_following_an_in_within_window_is_out() {
        let last = LastPunch { inout: IN, punch_time: Utc::now() };
        assert_eq!(infer_inout(Some(&last), Utc::now(), window()), OUT);
    }

    #[test]
    fn punch_following_an_out_within_window_is_in() {
        let last = LastPunch { inout: OUT, punch_time: Utc::now() };
        assert_eq!(infer_inout(Some(&last), Utc::now(), window()), IN);
    }

    #[test]
    fn punch_after_window_expires_restarts_as_in() {
        let last = LastPunch { inout: IN, punch_time: Utc::now() - chrono::Duration::hours(19) };
        assert_eq!(infer_inout(Some(&last), Utc::now(), window()), IN);
    }
}
