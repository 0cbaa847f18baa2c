//! Pending-context correlation (§4.2): when the hub pushes a command to a
//! terminal and needs to match the eventual `ret` frame back to the
//! caller that issued it, it registers a waiter keyed by `(sn, verb)`.
//! TM20 terminals process one command at a time and reply with the verb
//! that provoked the reply, so the pair is enough to disambiguate -- no
//! request id is carried on the wire.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

type Key = (String, String);

struct Entry {
    responder: oneshot::Sender<Value>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct PendingContextMap {
    entries: Mutex<HashMap<Key, Entry>>,
}

impl PendingContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for the next `ret` frame matching `(sn, verb)`.
    /// If one is already registered for the same key it is dropped (its
    /// receiver resolves to a closed channel), since a terminal only has
    /// one outstanding command of a given verb at a time.
    pub fn register(&self, sn: &str, verb: &str, ttl: Duration) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let entry = Entry { responder: tx, expires_at: Instant::now() + ttl };
        self.entries.lock().unwrap().insert((sn.to_owned(), verb.to_owned()), entry);
        rx
    }

    /// Resolves a pending waiter with the `ret` payload. Returns `true` if
    /// a waiter was found (the caller uses this to decide whether the
    /// response was solicited or unexpected).
    pub fn resolve(&self, sn: &str, verb: &str, value: Value) -> bool {
        let entry = self.entries.lock().unwrap().remove(&(sn.to_owned(), verb.to_owned()));
        match entry {
            Some(entry) => entry.responder.send(value).is_ok(),
            None => false,
        }
    }

    /// Drops all entries past their TTL. Returns the `(sn, verb)` pairs
    /// that timed out, so the caller can publish a `CommandTimeout` event.
    pub fn sweep_expired(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<Key> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_delivers_value_to_registered_waiter() {
        let map = PendingContextMap::new();
        let rx = map.register("TM20-001", "setusername", Duration::from_secs(10));
        assert!(map.resolve("TM20-001", "setusername", json!({"ret": "setusername", "result": true})));
        let value = rx.await.unwrap();
        assert_eq!(value["result"], true);
    }

    #[test]
    fn resolve_returns_false_when_no_waiter_registered() {
        let map = PendingContextMap::new();
        assert!(!map.resolve("TM20-001", "setusername", json!({})));
    }

    #[test]
    fn sweep_expired_removes_only_timed_out_entries() {
        let map = PendingContextMap::new();
        let _rx_short = map.register("TM20-001", "setusername", Duration::from_millis(0));
        let _rx_long = map.register("TM20-002", "setusername", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        let expired = map.sweep_expired();
        assert_eq!(expired, vec![("TM20-001".to_owned(), "setusername".to_owned())]);
        assert_eq!(map.len(), 1);
    }
}
