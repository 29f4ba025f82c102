use serde::Serialize;
use thiserror::Error;

/// One audit entry. `details` is a free-form JSON blob so callers don't need
/// a new variant for every action they want to record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub record_type: String,
    pub action: String,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: u64,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink failed: {0}")]
    SinkFailed(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
