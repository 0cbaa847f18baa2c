//! Counters, gauges, rate meters and histograms (§4.5), composed from three
//! small reusable primitives rather than one monolithic struct -- mirrors
//! the original `Counter`/`Gauge`/`Histogram` split in the source system's
//! metrics module.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

/// A monotonically increasing count.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time value that can move up or down.
#[derive(Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decr(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

const DEFAULT_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const MAX_SAMPLES: usize = 10_000;

/// A bucketed/percentile histogram, capped at a bounded sample count so a
/// long-running process cannot grow this unboundedly.
pub struct Histogram {
    buckets: Vec<f64>,
    bucket_counts: Vec<AtomicU64>,
    samples: RwLock<VecDeque<f64>>,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Option<Vec<f64>>) -> Self {
        let buckets = buckets.unwrap_or_else(|| DEFAULT_BUCKETS.to_vec());
        let bucket_counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            bucket_counts,
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        for (i, bound) in self.buckets.iter().enumerate() {
            if value <= *bound {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Ok(mut samples) = self.samples.write() {
            samples.push_back(value);
            while samples.len() > MAX_SAMPLES {
                samples.pop_front();
            }
        }
    }

    /// Percentile in `(0.0, 100.0]`, computed from the retained sample
    /// window (not the full history once it exceeds `MAX_SAMPLES`).
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let samples = self.samples.read().ok()?;
        if samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted.get(rank.min(sorted.len() - 1)).copied()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Value {
        json!({
            "count": self.count(),
            "p50": self.percentile(50.0),
            "p90": self.percentile(90.0),
            "p95": self.percentile(95.0),
            "p99": self.percentile(99.0),
        })
    }
}

/// A sliding 60-second rate meter: counts events per second over the last
/// minute, bucketed to whole seconds.
pub struct RateMeter {
    window: Duration,
    buckets: RwLock<VecDeque<(Instant, u64)>>,
}

impl RateMeter {
    pub fn new() -> Self {
        Self { window: Duration::from_secs(60), buckets: RwLock::new(VecDeque::new()) }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        let now = Instant::now();
        if let Ok(mut buckets) = self.buckets.write() {
            buckets.push_back((now, n));
            self.trim(&mut buckets, now);
        }
    }

    fn trim(&self, buckets: &mut VecDeque<(Instant, u64)>, now: Instant) {
        while let Some((t, _)) = buckets.front() {
            if now.duration_since(*t) > self.window {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }

    /// Events per second averaged over the trailing window.
    pub fn rate_per_sec(&self) -> f64 {
        let now = Instant::now();
        let Ok(mut buckets) = self.buckets.write() else { return 0.0 };
        self.trim(&mut buckets, now);
        let total: u64 = buckets.iter().map(|(_, n)| n).sum();
        total as f64 / self.window.as_secs_f64()
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct PerSnCounters {
    messages: Counter,
    logs: Counter,
}

/// Process-wide metrics, exported to the shared KV mirror on a throttled
/// schedule (§4.5: at most once per second).
pub struct Metrics {
    pub total_connections: Counter,
    pub total_disconnections: Counter,
    pub total_errors: Counter,
    pub messages_in: Counter,
    pub messages_out: Counter,
    pub logs_received: Counter,
    pub commands_sent: Counter,
    pub commands_success: Counter,
    pub commands_failed: Counter,
    pub active_connections: Gauge,
    pub message_rate: RateMeter,
    pub log_rate: RateMeter,
    pub handler_latency: Histogram,
    pub db_write_latency: Histogram,
    per_sn: RwLock<HashMap<String, PerSnCounters>>,
}

#[derive(Serialize)]
pub struct PerSnSnapshot {
    pub sn: String,
    pub messages: u64,
    pub logs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_connections: Counter::default(),
            total_disconnections: Counter::default(),
            total_errors: Counter::default(),
            messages_in: Counter::default(),
            messages_out: Counter::default(),
            logs_received: Counter::default(),
            commands_sent: Counter::default(),
            commands_success: Counter::default(),
            commands_failed: Counter::default(),
            active_connections: Gauge::default(),
            message_rate: RateMeter::new(),
            log_rate: RateMeter::new(),
            handler_latency: Histogram::new(None),
            db_write_latency: Histogram::new(None),
            per_sn: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_message(&self, sn: &str) {
        self.messages_in.incr();
        self.message_rate.mark();
        if let Ok(mut map) = self.per_sn.write() {
            map.entry(sn.to_owned()).or_default().messages.incr();
        }
    }

    pub fn record_logs(&self, sn: &str, count: u64) {
        self.logs_received.incr_by(count);
        self.log_rate.mark_n(count);
        if let Ok(mut map) = self.per_sn.write() {
            map.entry(sn.to_owned()).or_default().logs.incr_by(count);
        }
    }

    pub fn per_sn_snapshot(&self) -> Vec<PerSnSnapshot> {
        self.per_sn
            .read()
            .map(|map| {
                map.iter()
                    .map(|(sn, c)| PerSnSnapshot { sn: sn.clone(), messages: c.messages.get(), logs: c.logs.get() })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Value {
        json!({
            "total_connections": self.total_connections.get(),
            "total_disconnections": self.total_disconnections.get(),
            "total_errors": self.total_errors.get(),
            "messages_in": self.messages_in.get(),
            "messages_out": self.messages_out.get(),
            "logs_received": self.logs_received.get(),
            "commands_sent": self.commands_sent.get(),
            "commands_success": self.commands_success.get(),
            "commands_failed": self.commands_failed.get(),
            "active_connections": self.active_connections.get(),
            "messages_per_sec": self.message_rate.rate_per_sec(),
            "logs_per_sec": self.log_rate.rate_per_sec(),
            "handler_latency_seconds": self.handler_latency.snapshot(),
            "db_write_latency_seconds": self.db_write_latency.snapshot(),
            "per_sn": self.per_sn_snapshot().into_iter().map(|s| json!({"sn": s.sn, "messages": s.messages, "logs": s.logs})).collect::<Vec<_>>(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::default();
        c.incr();
        c.incr_by(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn gauge_tracks_current_value() {
        let g = Gauge::default();
        g.incr();
        g.incr();
        g.decr();
        assert_eq!(g.get(), 1);
    }

    #[test]
    fn histogram_percentiles_are_monotonic() {
        let h = Histogram::new(None);
        for v in [0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 9.0] {
            h.observe(v);
        }
        let p50 = h.percentile(50.0).unwrap();
        let p90 = h.percentile(90.0).unwrap();
        let p99 = h.percentile(99.0).unwrap();
        assert!(p50 <= p90);
        assert!(p90 <= p99);
    }

    #[test]
    fn histogram_with_no_samples_has_no_percentile() {
        let h = Histogram::new(None);
        assert_eq!(h.percentile(50.0), None);
    }

    #[test]
    fn metrics_tracks_per_sn_breakdown() {
        let m = Metrics::new();
        m.record_message("TM20-001");
        m.record_message("TM20-001");
        m.record_logs("TM20-001", 3);
        m.record_message("TM20-002");
        let snap = m.per_sn_snapshot();
        let entry = snap.iter().find(|s| s.sn == "TM20-001").unwrap();
        assert_eq!(entry.messages, 2);
        assert_eq!(entry.logs, 3);
    }
}
