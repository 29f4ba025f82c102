use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::model::AuditRecord;
use crate::sink::AuditSink;

struct Inner {
    queue: Mutex<VecDeque<AuditRecord>>,
    notify: Notify,
    capacity: usize,
    batch_size: usize,
    seq: AtomicU64,
    dropped: AtomicU64,
    sink: Arc<dyn AuditSink>,
    shutdown: AtomicBool,
}

/// Non-blocking audit queue with a background flusher.
///
/// `log()` never awaits and never blocks handlers on durable storage: it
/// pushes onto a bounded in-memory queue and returns. When the queue is
/// full the oldest record is dropped and `dropped_count` increments, so a
/// slow or unavailable sink degrades audit coverage rather than request
/// latency.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Inner>,
}

impl AuditLogger {
    /// Starts the background flusher and returns a cloneable handle plus its
    /// task handle. Call `shutdown` with the task handle before exit to
    /// drain whatever is left in the queue.
    pub fn spawn(
        sink: Arc<dyn AuditSink>,
        capacity: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            batch_size,
            seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sink,
            shutdown: AtomicBool::new(false),
        });

        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = task_inner.notify.notified() => {}
                }
                drain_and_flush(&task_inner);
                if task_inner.shutdown.load(Ordering::Acquire) {
                    break;
                }
            }
        });

        (Self { inner }, handle)
    }

    pub fn log(
        &self,
        record_type: impl Into<String>,
        action: impl Into<String>,
        user_id: Option<String>,
        ip: Option<String>,
        details: Option<serde_json::Value>,
        timestamp: u64,
    ) {
        let record = AuditRecord {
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
            record_type: record_type.into(),
            action: action.into(),
            user_id,
            ip,
            details,
            timestamp,
        };

        let mut queue = self.inner.queue.lock().expect("audit queue mutex poisoned");
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(record);
        drop(queue);
        self.inner.notify.notify_one();
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn queued_count(&self) -> usize {
        self.inner.queue.lock().expect("audit queue mutex poisoned").len()
    }

    /// Signals the background task to stop, waits for it, then drains
    /// anything still queued directly so no record enqueued just before
    /// shutdown is lost.
    pub async fn shutdown(&self, handle: JoinHandle<()>) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.notify.notify_one();
        let _ = handle.await;
        // Drain fully, ignoring batch_size: shutdown must not leave records behind.
        loop {
            let batch: Vec<AuditRecord> = {
                let mut queue = self.inner.queue.lock().expect("audit queue mutex poisoned");
                if queue.is_empty() {
                    break;
                }
                let n = queue.len().min(self.inner.batch_size.max(1));
                queue.drain(..n).collect()
            };
            if let Err(err) = self.inner.sink.flush(&batch) {
                tracing::warn!(error = %err, dropped = batch.len(), "audit sink flush failed during shutdown");
            }
        }
    }
}

fn drain_and_flush(inner: &Inner) {
    let batch: Vec<AuditRecord> = {
        let mut queue = inner.queue.lock().expect("audit queue mutex poisoned");
        let n = queue.len().min(inner.batch_size.max(1));
        queue.drain(..n).collect()
    };
    if batch.is_empty() {
        return;
    }
    if let Err(err) = inner.sink.flush(&batch) {
        tracing::warn!(error = %err, dropped = batch.len(), "audit sink flush failed");
    }
}
