pub mod audit;
pub mod config;
pub mod destination;
pub mod fetcher;
pub mod model;
pub mod poster;
pub mod reference;
pub mod retry;
pub mod snapshot;
pub mod source;
pub mod stages;
pub mod testing;
pub mod transform;
pub mod uploader;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditHandle, AuditRecord, AuditStore,
    AuditWriter, JsonlAuditStore, MemoryAuditStore,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    LogFormat, Requirements, SanitizedConfig,
};
pub use destination::{AteraClient, Destination, DestinationError};
pub use fetcher::{fetch_all, fetch_for_values, FetchOutcome};
pub use poster::{post_all, post_ticket, PostReport, PostState, TicketOutcome};
pub use reference::ReferenceSet;
pub use retry::{Backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotError};
pub use source::{AutotaskClient, Page, PageRequest, PageSource, QueryFilter, SourceApi, SourceError};
pub use stages::{run_all, run_stage, Stage, StageContext, StageError, StageSummary};
pub use transform::{transform_all, transform_comments, transform_ticket};
pub use uploader::{upload_all, upload_contacts, ErrorLedger, FailureRecord, UploadReport};
