use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

/// Tracks outstanding engine requests keyed by correlation id. At most one
/// entry per id; each is fulfilled exactly once, either by a matching reply
/// or by `fail_all` on disconnect.
pub struct PendingRequests {
    next_corr: AtomicU64,
    inflight: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_corr: AtomicU64::new(1),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates a fresh correlation id and registers a completion slot for it.
    pub fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let corr = self.next_corr.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inflight.lock().expect("pending requests mutex poisoned").insert(corr, tx);
        (corr, rx)
    }

    /// Removes a pending entry without fulfilling it — used when a caller's
    /// timeout fires before a reply arrives, so a late reply is dropped.
    pub fn cancel(&self, corr: u64) {
        self.inflight.lock().expect("pending requests mutex poisoned").remove(&corr);
    }

    /// Resolves the pending entry for `corr`, if any is still registered.
    /// Returns false if the correlation id is unknown (already resolved,
    /// cancelled, or never issued — logged by the caller as a late reply).
    pub fn resolve(&self, corr: u64, payload: Value) -> bool {
        let sender = self.inflight.lock().expect("pending requests mutex poisoned").remove(&corr);
        match sender {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Drains every pending entry, dropping each sender so the corresponding
    /// receiver observes a closed channel (mapped by the caller to
    /// `engine_unavailable`).
    pub fn fail_all(&self) {
        self.inflight.lock().expect("pending requests mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.inflight.lock().expect("pending requests mutex poisoned").len()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_delivers_payload_to_registered_receiver() {
        let pending = PendingRequests::new();
        let (corr, rx) = pending.register();
        assert!(pending.resolve(corr, json!({"ok": true})));
        let payload = rx.await.unwrap();
        assert_eq!(payload["ok"], true);
    }

    #[tokio::test]
    async fn resolve_is_false_for_unknown_corr() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve(999, json!(null)));
    }

    #[tokio::test]
    async fn fail_all_closes_every_receiver() {
        let pending = PendingRequests::new();
        let (_, rx1) = pending.register();
        let (_, rx2) = pending.register();
        pending.fail_all();
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }

    #[tokio::test]
    async fn cancel_makes_a_later_resolve_a_noop() {
        let pending = PendingRequests::new();
        let (corr, rx) = pending.register();
        pending.cancel(corr);
        assert!(!pending.resolve(corr, json!(null)));
        assert!(rx.await.is_err());
    }
}
