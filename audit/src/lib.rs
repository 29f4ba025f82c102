pub mod logger;
pub mod model;
pub mod sink;

pub use logger::AuditLogger;
pub use model::{AuditError, AuditRecord, AuditResult};
pub use sink::{AuditSink, LogAuditSink, MemoryAuditSink};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn logs_are_flushed_to_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let (logger, handle) = AuditLogger::spawn(sink.clone(), 16, 8, Duration::from_millis(10));

        logger.log("auth", "login", Some("u1".into()), Some("127.0.0.1".into()), None, 1);
        logger.log("order", "create", Some("u1".into()), None, None, 2);

        logger.shutdown(handle).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "login");
        assert_eq!(records[1].action, "create");
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let sink = Arc::new(MemoryAuditSink::new());
        // Long interval so nothing flushes until we ask; capacity 2 forces drops.
        let (logger, handle) = AuditLogger::spawn(sink.clone(), 2, 8, Duration::from_secs(60));

        logger.log("a", "one", None, None, None, 1);
        logger.log("a", "two", None, None, None, 2);
        logger.log("a", "three", None, None, None, 3);

        assert_eq!(logger.dropped_count(), 1);
        assert_eq!(logger.queued_count(), 2);

        logger.shutdown(handle).await;
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "two");
        assert_eq!(records[1].action, "three");
    }

    #[tokio::test]
    async fn shutdown_drains_everything_even_past_batch_size() {
        let sink = Arc::new(MemoryAuditSink::new());
        let (logger, handle) = AuditLogger::spawn(sink.clone(), 32, 2, Duration::from_secs(60));

        for i in 0..10u64 {
            logger.log("a", format!("action-{i}"), None, None, None, i);
        }

        logger.shutdown(handle).await;
        assert_eq!(sink.records().len(), 10);
        assert_eq!(logger.queued_count(), 0);
    }
}
