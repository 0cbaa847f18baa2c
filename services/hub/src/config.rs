//! Environment-derived configuration, read once at startup (§A.3).

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub redis_url: String,
    pub heartbeat_interval: Duration,
    pub connection_timeout: Duration,
    pub require_whitelist: bool,
    pub max_log_batch_size: usize,
    pub sync_session_window: Duration,
    pub attendance_batch_size: usize,
    pub log_level: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379/0"),
            heartbeat_interval: Duration::from_secs(env_parse("HEARTBEAT_INTERVAL", 30)),
            connection_timeout: Duration::from_secs(env_parse("CONNECTION_TIMEOUT", 90)),
            require_whitelist: env_parse("REQUIRE_WHITELIST", false),
            max_log_batch_size: env_parse("MAX_LOG_BATCH_SIZE", 40),
            sync_session_window: Duration::from_secs(env_parse::<u64>("SYNC_SESSION_WINDOW_HOURS", 18) * 3600),
            attendance_batch_size: env_parse("ATTENDANCE_BATCH_SIZE", 100),
            log_level: env_or("LOG_LEVEL", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        env::remove_var("TM20_TEST_UNSET_KEY");
        assert_eq!(env_or("TM20_TEST_UNSET_KEY", "fallback"), "fallback");
    }

    #[test]
    fn env_parse_falls_back_on_missing_or_bad_value() {
        env::remove_var("TM20_TEST_PARSE_KEY");
        assert_eq!(env_parse::<u64>("TM20_TEST_PARSE_KEY", 42), 42);
        env::set_var("TM20_TEST_PARSE_KEY", "not-a-number");
        assert_eq!(env_parse::<u64>("TM20_TEST_PARSE_KEY", 42), 42);
        env::remove_var("TM20_TEST_PARSE_KEY");
    }
}
