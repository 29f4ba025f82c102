use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex as AsyncMutex;

use serde::Serialize;
use tokio::sync::mpsc;

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_nanos() as u64
}

#[derive(Debug, Clone, Serialize)]
pub struct SseEvent {
    pub id: u64,
    pub event_type: String,
    pub timestamp_ns: u64,
    /// Already-serialized single-line JSON; publishers are responsible for
    /// not embedding raw newlines (the wire frame is newline-sensitive).
    pub data: String,
}

/// A subscriber's handle into the broadcaster. Live events are pushed into
/// the channel whose receiving half is held here; awaiting `recv()` is both
/// the wait and the delivery, replacing the source's separate
/// awaiter/pending-queue pair. `closed` is set by the broadcaster when this
/// subscriber falls behind and shared with the `Sender` entry so both sides
/// observe the same state.
pub struct Subscription {
    pub id: u64,
    pub last_id: Arc<AtomicU64>,
    pub closed: Arc<AtomicBool>,
    receiver: AsyncMutex<mpsc::Receiver<SseEvent>>,
}

impl Subscription {
    pub async fn recv(&self) -> Option<SseEvent> {
        self.receiver.lock().await.recv().await
    }
}

struct Sender {
    tx: mpsc::Sender<SseEvent>,
    last_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

/// Monotonic event-id assignment, bounded history, and per-subscriber
/// dispatch. One lock each for history and the subscription table; neither
/// is ever held across an await point.
pub struct EventBroadcaster {
    next_id: AtomicU64,
    history_size: usize,
    subscriber_queue_depth: usize,
    history: Mutex<VecDeque<SseEvent>>,
    subscriptions: Mutex<HashMap<u64, Sender>>,
    next_sub_id: AtomicU64,
}

impl EventBroadcaster {
    pub fn new(history_size: usize, subscriber_queue_depth: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            history_size,
            subscriber_queue_depth,
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            subscriptions: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(1),
        }
    }

    pub fn publish(&self, event_type: &str, data: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = SseEvent { id, event_type: event_type.to_string(), timestamp_ns: now_ns(), data };

        {
            let mut history = self.history.lock().expect("broadcaster history mutex poisoned");
            history.push_back(event.clone());
            while history.len() > self.history_size {
                history.pop_front();
            }
        }

        let mut dead = Vec::new();
        {
            let subs = self.subscriptions.lock().expect("broadcaster subscriptions mutex poisoned");
            for (sub_id, sender) in subs.iter() {
                match sender.tx.try_send(event.clone()) {
                    Ok(()) => {
                        sender.last_id.store(id, Ordering::Release);
                    }
                    Err(_) => {
                        // Slow consumer: close it rather than block the publisher.
                        sender.closed.store(true, Ordering::Release);
                        dead.push(*sub_id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut subs = self.subscriptions.lock().expect("broadcaster subscriptions mutex poisoned");
            for sub_id in dead {
                subs.remove(&sub_id);
            }
        }
        id
    }

    pub fn publish_batch(&self, events: Vec<(String, String)>) -> Vec<u64> {
        events.into_iter().map(|(event_type, data)| self.publish(&event_type, data)).collect()
    }

    pub fn subscribe(&self, last_seen_id: u64) -> Arc<Subscription> {
        let sub_id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_queue_depth);
        let last_id = Arc::new(AtomicU64::new(last_seen_id));
        let closed = Arc::new(AtomicBool::new(false));

        self.subscriptions.lock().expect("broadcaster subscriptions mutex poisoned").insert(
            sub_id,
            Sender { tx, last_id: last_id.clone(), closed: closed.clone() },
        );

        Arc::new(Subscription { id: sub_id, last_id, closed, receiver: AsyncMutex::new(rx) })
    }

    /// Explicit removal step taken by the SSE handler on disconnect or
    /// subscription close — there is no shared strong-ownership cycle to
    /// break, so this is the only place an entry leaves the map outside of
    /// the slow-consumer path in `publish`.
    pub fn deregister(&self, sub_id: u64) {
        self.subscriptions.lock().expect("broadcaster subscriptions mutex poisoned").remove(&sub_id);
    }

    pub fn history_since(&self, last_seen_id: u64) -> Vec<SseEvent> {
        self.history
            .lock()
            .expect("broadcaster history mutex poisoned")
            .iter()
            .filter(|event| event.id > last_seen_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_events_in_id_order() {
        let broadcaster = EventBroadcaster::new(10, 10);
        let sub = broadcaster.subscribe(0);
        broadcaster.publish("market-data", "{\"a\":1}".to_string());
        broadcaster.publish("market-data", "{\"a\":2}".to_string());
        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert!(first.id < second.id);
    }

    #[tokio::test]
    async fn history_since_returns_only_newer_entries() {
        let broadcaster = EventBroadcaster::new(10, 10);
        for i in 0..5 {
            broadcaster.publish("system", format!("{{\"n\":{i}}}"));
        }
        let replay = broadcaster.history_since(3);
        assert_eq!(replay.len(), 2);
        assert!(replay.iter().all(|e| e.id > 3));
    }

    #[tokio::test]
    async fn history_ring_drops_oldest_beyond_capacity() {
        let broadcaster = EventBroadcaster::new(2, 10);
        broadcaster.publish("system", "1".to_string());
        broadcaster.publish("system", "2".to_string());
        broadcaster.publish("system", "3".to_string());
        let replay = broadcaster.history_since(0);
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].data, "2");
    }

    #[tokio::test]
    async fn deregister_stops_further_delivery() {
        let broadcaster = EventBroadcaster::new(10, 10);
        let sub = broadcaster.subscribe(0);
        broadcaster.deregister(sub.id);
        broadcaster.publish("system", "x".to_string());
        // no live subscriber left registered; publish should not panic or block
        assert_eq!(broadcaster.history_since(0).len(), 1);
    }
}
