use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Background task that receives audit events and appends them to storage
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    /// Create a new audit writer
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming events until every handle has been dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::debug!("Audit writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord {
                timestamp: envelope.timestamp,
                run_id: envelope.run_id.to_string(),
                event_type: envelope.event.event_type().to_string(),
                subject: envelope.event.subject().map(String::from),
                data: envelope.event,
            };

            if let Err(e) = self.store.append(&record) {
                tracing::error!("Failed to write audit event: {}", e);
            }
        }

        tracing::debug!("Audit writer shutting down");
    }
}

/// Create a complete audit system
///
/// Returns:
/// - `AuditHandle` - for emitting events (clone this to share across stages)
/// - `AuditWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
///
/// # Arguments
/// * `store` - The audit store to append events to
/// * `run_id` - Identifier stamped on every record of this run
/// * `buffer_size` - Size of the channel buffer (emitters wait if full)
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    run_id: impl Into<Arc<str>>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AuditHandle::new(tx, run_id);
    let writer = AuditWriter::new(rx, store);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditError, AuditEvent, MemoryAuditStore};

    struct FailingStore;

    impl AuditStore for FailingStore {
        fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Poisoned)
        }

        fn records(&self) -> Result<Vec<AuditRecord>, AuditError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_writer_receives_and_stores_events() {
        let store = Arc::new(MemoryAuditStore::new());
        let (handle, writer) = create_audit_system(store.clone(), "run-7", 10);
        let writer_handle = tokio::spawn(writer.run());

        handle
            .emit(AuditEvent::FetchCompleted {
                fetch: "Resources isActive=1".to_string(),
                pages: 2,
                items: 120,
            })
            .await;

        drop(handle);
        writer_handle.await.unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "fetch_completed");
        assert_eq!(records[0].run_id, "run-7");
        assert_eq!(records[0].subject.as_deref(), Some("Resources isActive=1"));
    }

    #[tokio::test]
    async fn test_writer_continues_on_append_failure() {
        let (handle, writer) = create_audit_system(Arc::new(FailingStore), "run", 10);
        let writer_handle = tokio::spawn(writer.run());

        handle
            .emit(AuditEvent::RecordUploaded {
                identifier: "x".to_string(),
            })
            .await;
        drop(handle);

        // Writer should complete normally
        writer_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_preserves_emission_order() {
        let store = Arc::new(MemoryAuditStore::new());
        let (handle, writer) = create_audit_system(store.clone(), "run", 4);
        let second = handle.clone();
        let writer_handle = tokio::spawn(writer.run());

        for attempt in 1..=3 {
            handle
                .emit(AuditEvent::PageRequested {
                    fetch: "Contacts isActive=0".to_string(),
                    url: "u".to_string(),
                    attempt,
                })
                .await;
        }
        second
            .emit(AuditEvent::RunFinished {
                stage: "contacts".to_string(),
                succeeded: 3,
                failed: 0,
            })
            .await;

        drop(handle);
        drop(second);

        let result =
            tokio::time::timeout(tokio::time::Duration::from_secs(1), writer_handle).await;
        assert!(result.is_ok(), "Writer should exit after all handles dropped");

        let types: Vec<_> = store
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                "page_requested",
                "page_requested",
                "page_requested",
                "run_finished"
            ]
        );
    }
}
