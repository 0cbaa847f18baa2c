//! Device Registry (§4.3): tracks which terminals currently hold an open
//! session and provides `send_to_device`/`broadcast` against the live
//! mailbox for each. Keyed by serial number rather than a bare connection
//! marker, since a caller elsewhere in the hub needs to push a command to
//! a specific terminal by its serial.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, Duration};

use crate::event_bus::{EventBus, HubEvent};
use crate::kv::SharedKv;

pub const OUTBOUND_MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("terminal {0} is not connected")]
    NotConnected(String),
    #[error("mailbox for terminal {0} is closed")]
    MailboxClosed(String),
}

#[derive(Clone)]
pub struct SessionHandle {
    pub sn: String,
    pub connected_at: DateTime<Utc>,
    mailbox: mpsc::Sender<String>,
    last_seen_millis: Arc<AtomicI64>,
}

impl SessionHandle {
    pub fn new(sn: String, mailbox: mpsc::Sender<String>) -> Self {
        Self {
            sn,
            connected_at: Utc::now(),
            mailbox,
            last_seen_millis: Arc::new(AtomicI64::new(Utc::now().timestamp_millis())),
        }
    }

    pub fn touch(&self) {
        self.last_seen_millis.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_seen_millis.load(Ordering::Relaxed)).unwrap_or_else(Utc::now)
    }

    pub async fn send(&self, frame: String) -> Result<(), RegistryError> {
        self.mailbox
            .send(frame)
            .await
            .map_err(|_| RegistryError::MailboxClosed(self.sn.clone()))
    }
}

#[derive(Default)]
pub struct DeviceRegistry {
    sessions: std::sync::RwLock<HashMap<String, SessionHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing and returning any prior handle for
    /// the same serial number (a terminal reconnecting before the old
    /// socket noticed it was dead).
    pub fn register(&self, handle: SessionHandle) -> Option<SessionHandle> {
        self.sessions.write().unwrap().insert(handle.sn.clone(), handle)
    }

    pub fn unregister(&self, sn: &str) {
        self.sessions.write().unwrap().remove(sn);
    }

    pub fn get(&self, sn: &str) -> Option<SessionHandle> {
        self.sessions.read().unwrap().get(sn).cloned()
    }

    pub fn is_connected(&self, sn: &str) -> bool {
        self.sessions.read().unwrap().contains_key(sn)
    }

    pub fn connected_sns(&self) -> Vec<String> {
        self.sessions.read().unwrap().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub async fn send_to_device(&self, sn: &str, frame: String) -> Result<(), RegistryError> {
        let handle = self.get(sn).ok_or_else(|| RegistryError::NotConnected(sn.to_owned()))?;
        handle.send(frame).await
    }

    pub async fn broadcast(&self, frame: String) {
        let handles: Vec<SessionHandle> = self.sessions.read().unwrap().values().cloned().collect();
        for handle in handles {
            let _ = handle.send(frame.clone()).await;
        }
    }

    /// Sessions idle longer than `timeout`, for the health monitor to
    /// reap. Does not remove them -- the owning connection task is
    /// responsible for closing its own socket and calling `unregister`.
    pub fn stale_sessions(&self, timeout: Duration) -> Vec<String> {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout).unwrap_or_default();
        self.sessions
            .read()
            .unwrap()
            .values()
            .filter(|h| h.last_seen() < cutoff)
            .map(|h| h.sn.clone())
            .collect()
    }
}

/// Background task: periodically mirrors connected-device liveness into
/// the shared KV store. Stale-session detection itself happens inline in
/// each session's own heartbeat loop (§4.2); this task only publishes the
/// registry's view of the world for other processes to read.
pub async fn spawn_health_monitor(
    registry: Arc<DeviceRegistry>,
    kv: SharedKv,
    event_bus: Arc<EventBus>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    loop {
        ticker.tick().await;
        let sns = registry.connected_sns();
        if let Err(err) = kv.mirror_connected_devices(&sns).await {
            tracing::warn!(error = %err, "failed to mirror connected devices to redis");
            event_bus.publish(HubEvent::ErrorOccurred { message: format!("kv mirror failed: {err}") });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(sn: &str) -> (SessionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_MAILBOX_CAPACITY);
        (SessionHandle::new(sn.to_owned(), tx), rx)
    }

    #[test]
    fn register_and_get_round_trips() {
        let registry = DeviceRegistry::new();
        let (h, _rx) = handle("TM20-001");
        registry.register(h);
        assert!(registry.is_connected("TM20-001"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_replaces_prior_session_for_same_sn() {
        let registry = DeviceRegistry::new();
        let (h1, _rx1) = handle("TM20-001");
        let (h2, _rx2) = handle("TM20-001");
        registry.register(h1);
        let replaced = registry.register(h2);
        assert!(replaced.is_some());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unregister_removes_session() {
        let registry = DeviceRegistry::new();
        let (h, _rx) = handle("TM20-001");
        registry.register(h);
        registry.unregister("TM20-001");
        assert!(!registry.is_connected("TM20-001"));
    }

    #[tokio::test]
    async fn send_to_device_delivers_to_mailbox() {
        let registry = DeviceRegistry::new();
        let (h, mut rx) = handle("TM20-001");
        registry.register(h);
        registry.send_to_device("TM20-001", "hello".to_owned()).await.unwrap();
        assert_eq!(rx.recv().await, Some("hello".to_owned()));
    }

    #[tokio::test]
    async fn send_to_device_errors_when_not_connected() {
        let registry = DeviceRegistry::new();
        let err = registry.send_to_device("TM20-999", "x".to_owned()).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotConnected(_)));
    }

    #[tokio::test]
    async fn broadcast_reaches_all_sessions() {
        let registry = DeviceRegistry::new();
        let (h1, mut rx1) = handle("TM20-001");
        let (h2, mut rx2) = handle("TM20-002");
        registry.register(h1);
        registry.register(h2);
        registry.broadcast("ping".to_owned()).await;
        assert_eq!(rx1.recv().await, Some("ping".to_owned()));
        assert_eq!(rx2.recv().await, Some("ping".to_owned()));
    }
}
