use crate::model::{AuditRecord, AuditResult};

/// Where flushed batches end up. The gateway has no durable-storage
/// requirement of its own (see Non-goals), so the default sink writes
/// structured log lines; a deployment that wants on-disk or remote storage
/// swaps in its own `AuditSink` without touching `AuditLogger`.
pub trait AuditSink: Send + Sync + 'static {
    fn flush(&self, batch: &[AuditRecord]) -> AuditResult<()>;
}

/// Emits one `tracing` event per record. This is the gateway's production
/// sink: audit records are not on the success path, so routing them through
/// the same log pipeline operators already watch is simpler than standing up
/// a dedicated store.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn flush(&self, batch: &[AuditRecord]) -> AuditResult<()> {
        for record in batch {
            tracing::info!(
                seq = record.seq,
                record_type = %record.record_type,
                action = %record.action,
                user_id = record.user_id.as_deref().unwrap_or("-"),
                ip = record.ip.as_deref().unwrap_or("-"),
                details = ?record.details,
                timestamp = record.timestamp,
                "audit"
            );
        }
        Ok(())
    }
}

/// Collects flushed batches in memory. Used by tests and by callers that
/// want to assert on exactly what the logger drained.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn flush(&self, batch: &[AuditRecord]) -> AuditResult<()> {
        self.records.lock().expect("audit sink mutex poisoned").extend_from_slice(batch);
        Ok(())
    }
}
