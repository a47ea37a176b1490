use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// Envelope wrapping an audit event with metadata
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub run_id: Arc<str>,
    pub event: AuditEvent,
}

/// Handle for emitting audit events
///
/// This is cheaply cloneable. Events are sent through an async channel to be
/// written by the AuditWriter, tagged with the run they belong to.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
    run_id: Arc<str>,
}

impl AuditHandle {
    /// Create a new audit handle from a channel sender
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>, run_id: impl Into<Arc<str>>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
        }
    }

    /// A handle whose events go nowhere (for callers that do not audit)
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self::new(tx, "disabled")
    }

    /// Emit an audit event asynchronously
    ///
    /// If the channel is closed, the error is logged at debug level and the
    /// caller is not failed: auditing never changes migration behaviour.
    pub async fn emit(&self, event: AuditEvent) {
        let envelope = AuditEventEnvelope {
            timestamp: Utc::now(),
            run_id: Arc::clone(&self.run_id),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::debug!("Audit event dropped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> AuditEvent {
        AuditEvent::RunStarted {
            version: "0.1.0".to_string(),
            stage: "tickets".to_string(),
            config_hash: "abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx, "run-1");

        handle.emit(started()).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert!(matches!(envelope.event, AuditEvent::RunStarted { .. }));
        assert_eq!(&*envelope.run_id, "run-1");
    }

    #[tokio::test]
    async fn test_disabled_handle_does_not_block() {
        let handle = AuditHandle::disabled();
        // Receiver is gone; emitting must neither panic nor hang
        handle.emit(started()).await;
        handle.emit(started()).await;
    }

    #[tokio::test]
    async fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx, "run-1");

        let before = Utc::now();
        handle.emit(started()).await;
        let after = Utc::now();

        let envelope = rx.try_recv().expect("Should receive event");
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
