//! Migration stages.
//!
//! Each stage is one batch step over the snapshot directory: it reads what
//! earlier stages saved, talks to one or both APIs, and saves its own
//! snapshot for the next stage. Reading a stage's input is the only failure
//! that stops a stage; everything else is logged, audited and, for
//! per-record failures, written to an error artifact.

mod fetch;
mod notes;
mod tickets;

pub use fetch::{fetch_contacts, fetch_destination_contacts, fetch_resources, fetch_tickets};
pub use notes::{attach_notes, fetch_ticket_notes};
pub use tickets::{post_tickets, transform_tickets};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::{Config, Requirements, RetryConfig};
use crate::destination::Destination;
use crate::retry::Sleeper;
use crate::snapshot::{write_snapshot, SnapshotError};
use crate::source::SourceApi;
use crate::uploader::ErrorLedger;

/// Output snapshot of the tickets stage.
pub const TICKETS_FILE: &str = "result1.json";
/// Output snapshot of the notes stage.
pub const TICKETS_WITH_NOTES_FILE: &str = "result2.json";
/// Output snapshot of the transform stage.
pub const TICKET_PAYLOADS_FILE: &str = "result3.json";

/// The pipeline steps, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Contacts,
    Resources,
    DestinationContacts,
    Tickets,
    Notes,
    Transform,
    Post,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Contacts,
        Stage::Resources,
        Stage::DestinationContacts,
        Stage::Tickets,
        Stage::Notes,
        Stage::Transform,
        Stage::Post,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Contacts => "contacts",
            Stage::Resources => "resources",
            Stage::DestinationContacts => "destination-contacts",
            Stage::Tickets => "tickets",
            Stage::Notes => "notes",
            Stage::Transform => "transform",
            Stage::Post => "post",
        }
    }

    /// Credentials the stage needs.
    pub fn requirements(&self) -> Requirements {
        match self {
            Stage::Contacts => Requirements::ALL,
            Stage::Resources | Stage::Tickets | Stage::Notes => Requirements {
                source: true,
                destination: false,
            },
            Stage::DestinationContacts | Stage::Post => Requirements {
                source: false,
                destination: true,
            },
            Stage::Transform => Requirements::NONE,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage {stage} could not read its input: {source}")]
    Input {
        stage: Stage,
        #[source]
        source: SnapshotError,
    },
}

/// What a stage run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub stage: Stage,
    pub succeeded: usize,
    pub failed: usize,
    /// Snapshot written, if any.
    pub output: Option<PathBuf>,
    /// Error artifact written, if any record failed.
    pub error_artifact: Option<PathBuf>,
}

impl StageSummary {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            succeeded: 0,
            failed: 0,
            output: None,
            error_artifact: None,
        }
    }
}

/// Everything a stage needs besides the API clients.
pub struct StageContext<'a> {
    pub data_dir: PathBuf,
    pub error_dir: PathBuf,
    pub retry: RetryConfig,
    pub sleeper: &'a dyn Sleeper,
    pub audit: AuditHandle,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &Config, sleeper: &'a dyn Sleeper, audit: AuditHandle) -> Self {
        Self {
            data_dir: config.paths.data_dir.clone(),
            error_dir: config.paths.error_dir.clone(),
            retry: config.retry.clone(),
            sleeper,
            audit,
        }
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn note_throttle(&self) -> Duration {
        Duration::from_millis(self.retry.note_throttle_ms)
    }

    /// Write a snapshot, logging and auditing the result. A failed write
    /// does not fail the stage.
    pub(crate) async fn save<T: Serialize>(&self, file: &str, records: &[T]) -> Option<PathBuf> {
        let path = self.data_path(file);
        let shown = path.display().to_string();
        match write_snapshot(&path, records) {
            Ok(()) => {
                info!(path = %shown, records = records.len(), "Snapshot saved");
                self.audit
                    .emit(AuditEvent::SnapshotWritten {
                        path: shown,
                        records: records.len(),
                    })
                    .await;
                Some(path)
            }
            Err(e) => {
                error!(path = %shown, error = %e, "Failed to save snapshot");
                self.audit
                    .emit(AuditEvent::SnapshotWriteFailed {
                        path: shown,
                        error: e.to_string(),
                    })
                    .await;
                None
            }
        }
    }

    /// Persist the stage's failures, if any.
    pub(crate) fn persist_errors(&self, ledger: &ErrorLedger, stage: Stage) -> Option<PathBuf> {
        match ledger.persist(&self.error_dir, stage.name()) {
            Ok(Some(path)) => {
                warn!(
                    stage = %stage,
                    failures = ledger.len(),
                    path = %path.display(),
                    "Errors logged to error artifact"
                );
                Some(path)
            }
            Ok(None) => {
                info!(stage = %stage, "No errors occurred during the stage");
                None
            }
            Err(e) => {
                error!(stage = %stage, error = %e, "Failed to save error artifact");
                None
            }
        }
    }
}

pub(crate) fn read_input<T: serde::de::DeserializeOwned>(
    stage: Stage,
    path: &Path,
) -> Result<Vec<T>, StageError> {
    crate::snapshot::read_snapshot(path).map_err(|source| StageError::Input { stage, source })
}

/// Run one stage.
pub async fn run_stage<S: SourceApi>(
    stage: Stage,
    ctx: &StageContext<'_>,
    source: &S,
    destination: &dyn Destination,
) -> Result<StageSummary, StageError> {
    info!(stage = %stage, "Starting stage");
    let summary = match stage {
        Stage::Contacts => fetch_contacts(ctx, source, destination).await,
        Stage::Resources => fetch_resources(ctx, source).await,
        Stage::DestinationContacts => fetch_destination_contacts(ctx, destination).await,
        Stage::Tickets => fetch_tickets(ctx, source).await,
        Stage::Notes => fetch_ticket_notes(ctx, source).await?,
        Stage::Transform => transform_tickets(ctx).await?,
        Stage::Post => post_tickets(ctx, destination).await?,
    };
    info!(
        stage = %stage,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Stage finished"
    );
    Ok(summary)
}

/// Run every stage in order, stopping at the first that cannot read its
/// input.
pub async fn run_all<S: SourceApi>(
    ctx: &StageContext<'_>,
    source: &S,
    destination: &dyn Destination,
) -> Result<Vec<StageSummary>, StageError> {
    let mut summaries = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        summaries.push(run_stage(stage, ctx, source, destination).await?);
    }
    Ok(summaries)
}
