use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // Run lifecycle
    RunStarted {
        version: String,
        stage: String,
        config_hash: String,
    },
    RunFinished {
        stage: String,
        succeeded: usize,
        failed: usize,
    },

    // Paginated fetches
    PageRequested {
        /// What is being fetched, e.g. "Tickets priority=2"
        fetch: String,
        url: String,
        attempt: u32,
    },
    PageFailed {
        fetch: String,
        url: String,
        attempt: u32,
        error: String,
        will_retry: bool,
    },
    FetchAbandoned {
        fetch: String,
        reason: String,
        items_kept: usize,
    },
    FetchCompleted {
        fetch: String,
        pages: u32,
        items: usize,
    },

    // Record uploads
    RecordUploaded {
        identifier: String,
    },
    RecordFailed {
        identifier: String,
        error: String,
    },

    // Ticket posting
    TicketPosted {
        title: String,
        ticket_id: String,
        attempts: u32,
    },
    TicketAttemptFailed {
        title: String,
        attempt: u32,
        error: String,
    },
    TicketFailed {
        title: String,
        attempts: u32,
        error: String,
    },
    CommentPosted {
        ticket_id: String,
    },
    CommentFailed {
        ticket_id: String,
        error: String,
    },

    // Files
    SnapshotWritten {
        path: String,
        records: usize,
    },
    SnapshotWriteFailed {
        path: String,
        error: String,
    },
}

impl AuditEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::RunFinished { .. } => "run_finished",
            Self::PageRequested { .. } => "page_requested",
            Self::PageFailed { .. } => "page_failed",
            Self::FetchAbandoned { .. } => "fetch_abandoned",
            Self::FetchCompleted { .. } => "fetch_completed",
            Self::RecordUploaded { .. } => "record_uploaded",
            Self::RecordFailed { .. } => "record_failed",
            Self::TicketPosted { .. } => "ticket_posted",
            Self::TicketAttemptFailed { .. } => "ticket_attempt_failed",
            Self::TicketFailed { .. } => "ticket_failed",
            Self::CommentPosted { .. } => "comment_posted",
            Self::CommentFailed { .. } => "comment_failed",
            Self::SnapshotWritten { .. } => "snapshot_written",
            Self::SnapshotWriteFailed { .. } => "snapshot_write_failed",
        }
    }

    /// The thing this event is about, if any (fetch label, record, ticket or file)
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::RunStarted { stage, .. } | Self::RunFinished { stage, .. } => Some(stage),
            Self::PageRequested { fetch, .. }
            | Self::PageFailed { fetch, .. }
            | Self::FetchAbandoned { fetch, .. }
            | Self::FetchCompleted { fetch, .. } => Some(fetch),
            Self::RecordUploaded { identifier } | Self::RecordFailed { identifier, .. } => {
                Some(identifier)
            }
            Self::TicketPosted { title, .. }
            | Self::TicketAttemptFailed { title, .. }
            | Self::TicketFailed { title, .. } => Some(title),
            Self::CommentPosted { ticket_id } | Self::CommentFailed { ticket_id, .. } => {
                Some(ticket_id)
            }
            Self::SnapshotWritten { path, .. } | Self::SnapshotWriteFailed { path, .. } => {
                Some(path)
            }
        }
    }
}

/// A stored audit record, one line of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub data: AuditEvent,
}
