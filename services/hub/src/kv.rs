//! Shared KV mirror (§6): a write side effect only, never a source of
//! truth. Connected-device and metrics state is mirrored to Redis, throttled
//! to at most once a second, so other processes (an admin UI, a sibling hub
//! instance) can read liveness without reaching into this process.

use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

const CONNECTED_DEVICES_KEY: &str = "tm20:connected_devices";
const CONNECTED_COUNT_KEY: &str = "tm20:connected_count";
const METRICS_KEY: &str = "tm20:metrics";
const MIRROR_TTL_SECONDS: u64 = 120;
const METRICS_EXPORT_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct SharedKv {
    conn: ConnectionManager,
}

impl SharedKv {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn mirror_connected_devices(&self, sns: &[String]) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(sns).unwrap_or_else(|_| "[]".to_owned());
        let _: () = conn.set_ex(CONNECTED_DEVICES_KEY, payload, MIRROR_TTL_SECONDS).await?;
        let _: () = conn.set_ex(CONNECTED_COUNT_KEY, sns.len(), MIRROR_TTL_SECONDS).await?;
        Ok(())
    }

    pub async fn mirror_metrics(&self, snapshot: &Value) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_owned());
        let _: () = conn.set_ex(METRICS_KEY, payload, MIRROR_TTL_SECONDS).await?;
        Ok(())
    }

    pub async fn ping(&self) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Throttles metrics export to at most once per second, per §4.5.
pub struct MetricsExportThrottle {
    last_export: Option<Instant>,
}

impl MetricsExportThrottle {
    pub fn new() -> Self {
        Self { last_export: None }
    }

    pub fn should_export(&mut self, now: Instant) -> bool {
        let ready = match self.last_export {
            None => true,
            Some(last) => now.duration_since(last) >= METRICS_EXPORT_MIN_INTERVAL,
        };
        if ready {
            self.last_export = Some(now);
        }
        ready
    }
}

impl Default for MetricsExportThrottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_allows_first_export_then_blocks_immediate_retry() {
        let mut throttle = MetricsExportThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.should_export(t0));
        assert!(!throttle.should_export(t0));
    }

    #[test]
    fn throttle_allows_export_after_interval_elapses() {
        let mut throttle = MetricsExportThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.should_export(t0));
        let t1 = t0 + Duration::from_millis(1100);
        assert!(throttle.should_export(t1));
    }
}
