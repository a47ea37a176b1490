//! End-to-end runs of the migration stages against mock APIs.
//!
//! These tests drive every stage over a temporary snapshot directory:
//! - Fetch stages write the snapshots the transformer joins against
//! - Notes are attached with retries and the throttle between tickets
//! - Payloads are posted with their comments and failures land in the
//!   error artifact
//! - Every request and outcome reaches the JSONL audit log

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use deskmigrate_core::{
    create_audit_system, read_snapshot, run_all, run_stage, write_snapshot, AuditHandle,
    AuditRecord, AuditStore, Config, JsonlAuditStore, Page, SourceError, Stage, StageContext,
    StageError,
    destination::DestinationError,
    model::{CommentAuthor, DestinationId, EndUserRef, Ticket, TicketPayload},
    reference::{PRIORITIES_FILE, STATUSES_FILE, TECHNICIANS_FILE},
    stages::{TICKETS_WITH_NOTES_FILE, TICKET_PAYLOADS_FILE},
    testing::{fixtures, MockDestination, MockSourceApi, RecordingSleeper},
};

/// Temporary directories, mocks and a live audit writer for one run.
struct TestHarness {
    config: Config,
    source: MockSourceApi,
    destination: MockDestination,
    sleeper: RecordingSleeper,
    audit: AuditHandle,
    audit_store: Arc<JsonlAuditStore>,
    writer: JoinHandle<()>,
    _dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.paths.data_dir = dir.path().join("json_files");
        config.paths.error_dir = dir.path().join("errors");
        config.paths.audit_log = dir.path().join("audit.jsonl");

        let audit_store = Arc::new(
            JsonlAuditStore::open(&config.paths.audit_log).expect("Failed to open audit log"),
        );
        let store: Arc<dyn AuditStore> = audit_store.clone();
        let (audit, writer) = create_audit_system(store, "test-run", 100);
        let writer = tokio::spawn(writer.run());

        Self {
            config,
            source: MockSourceApi::new(),
            destination: MockDestination::new(),
            sleeper: RecordingSleeper::new(),
            audit,
            audit_store,
            writer,
            _dir: dir,
        }
    }

    fn context(&self) -> StageContext<'_> {
        StageContext::new(&self.config, &self.sleeper, self.audit.clone())
    }

    fn data_dir(&self) -> &Path {
        &self.config.paths.data_dir
    }

    /// Write the snapshots an operator provides by hand.
    fn write_operator_files(&self) {
        write_snapshot(&self.data_dir().join(PRIORITIES_FILE), &fixtures::priorities())
            .expect("Failed to write priorities");
        write_snapshot(&self.data_dir().join(STATUSES_FILE), &fixtures::statuses())
            .expect("Failed to write statuses");
        write_snapshot(
            &self.data_dir().join(TECHNICIANS_FILE),
            &[
                fixtures::destination_technician("77", "tech@example.com"),
                fixtures::destination_technician("78", "known@example.com"),
            ],
        )
        .expect("Failed to write technicians");
    }

    /// Close the audit channel and return everything that was written.
    async fn finish(self) -> Vec<AuditRecord> {
        drop(self.audit);
        self.writer.await.expect("Audit writer panicked");
        self.audit_store.records().expect("Failed to read audit log")
    }
}

fn ticket_value(ticket: Ticket) -> Value {
    serde_json::to_value(ticket).expect("Failed to serialize ticket")
}

fn count_events(records: &[AuditRecord], event_type: &str) -> usize {
    records.iter().filter(|r| r.event_type == event_type).count()
}

#[tokio::test]
async fn test_full_run_migrates_tickets_with_comments() {
    let harness = TestHarness::new();
    harness.write_operator_files();

    harness.source.set_items(
        "Contacts isActive=1",
        vec![
            fixtures::contact_json(1, "known@example.com"),
            fixtures::contact_json(2, "newcomer@example.com"),
        ],
    );
    harness.source.set_items(
        "Resources isActive=1",
        vec![serde_json::to_value(fixtures::resource(10, "tech@example.com")).unwrap()],
    );
    harness.source.set_items(
        "Tickets priority=2",
        vec![
            ticket_value(fixtures::ticket(100, "Printer jam", Some(1), Some(10))),
            ticket_value(fixtures::ticket(101, "VPN down", Some(2), None)),
        ],
    );
    harness.source.push_notes(
        100,
        Ok(vec![
            fixtures::contact_note(1, "Still broken"),
            fixtures::resource_note(10, "On my way"),
        ]),
    );
    harness.source.push_notes(101, Err(SourceError::Timeout));
    harness.source.push_notes(101, Ok(Vec::new()));

    harness
        .destination
        .set_contact_pages(vec![Ok(Page::last(vec![fixtures::destination_contact(
            501,
            "known@example.com",
        )]))]);
    harness
        .destination
        .fail_next_tickets(1, DestinationError::Timeout);

    let ctx = harness.context();
    let summaries = run_all(&ctx, &harness.source, &harness.destination)
        .await
        .expect("Run failed");
    drop(ctx);

    let stages: Vec<Stage> = summaries.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    assert!(summaries.iter().all(|s| s.error_artifact.is_none()));

    // Contacts were created at the destination
    let created: Vec<_> = harness
        .destination
        .posted_contacts()
        .into_iter()
        .filter_map(|c| c.email)
        .collect();
    assert_eq!(created, vec!["known@example.com", "newcomer@example.com"]);

    // Notes were retried once and attached
    assert_eq!(harness.source.note_requests(), vec![100, 101, 101]);
    let with_notes: Vec<Ticket> =
        read_snapshot(&harness.data_dir().join(TICKETS_WITH_NOTES_FILE)).unwrap();
    assert_eq!(with_notes[0].notes().len(), 2);
    assert!(with_notes[1].notes().is_empty());

    // Payloads joined against every snapshot
    let payloads: Vec<TicketPayload> =
        read_snapshot(&harness.data_dir().join(TICKET_PAYLOADS_FILE)).unwrap();
    assert_eq!(payloads.len(), 2);

    let printer = &payloads[0];
    assert_eq!(printer.title.as_deref(), Some("Printer jam"));
    assert_eq!(printer.priority, "Medium");
    assert_eq!(printer.status, "New");
    assert_eq!(printer.impact, "Major");
    assert_eq!(printer.ticket_type, "Incident");
    assert_eq!(printer.technician_contact_id, Some(DestinationId::from("77")));
    assert_eq!(
        printer.end_user,
        Some(EndUserRef::Existing {
            end_user_id: DestinationId::Number(501)
        })
    );
    match &printer.comments[0].author {
        CommentAuthor::Technician(details) => {
            assert_eq!(details.technician_id, Some(DestinationId::from("78")));
            assert!(!details.is_internal);
        }
        other => panic!("Expected technician details, got {:?}", other),
    }
    match &printer.comments[1].author {
        CommentAuthor::EndUser(details) => assert!(details.enduser_id.is_none()),
        other => panic!("Expected end-user details, got {:?}", other),
    }

    let vpn = &payloads[1];
    assert!(vpn.technician_contact_id.is_none());
    assert_eq!(
        vpn.end_user,
        Some(EndUserRef::New {
            first_name: Some("Newcomer".to_string()),
            last_name: Some("Tester".to_string()),
            email: Some("newcomer@example.com".to_string()),
        })
    );
    assert!(vpn.comments.is_empty());

    // First post timed out and was retried, then both tickets got ids
    assert_eq!(harness.destination.ticket_attempts().len(), 3);
    let comments = harness.destination.posted_comments();
    assert_eq!(comments.len(), 2);
    assert!(comments
        .iter()
        .all(|(id, _)| *id == DestinationId::Number(1000)));
    let post = summaries.last().unwrap();
    assert_eq!(post.succeeded, 2);
    assert_eq!(post.failed, 0);

    let records = harness.finish().await;
    assert!(records.iter().all(|r| r.run_id == "test-run"));
    assert_eq!(count_events(&records, "ticket_posted"), 2);
    assert_eq!(count_events(&records, "ticket_attempt_failed"), 1);
    assert_eq!(count_events(&records, "comment_posted"), 2);
    assert_eq!(count_events(&records, "record_uploaded"), 2);
    assert!(count_events(&records, "snapshot_written") >= 5);
}

#[tokio::test]
async fn test_exhausted_post_writes_error_artifact() {
    let harness = TestHarness::new();
    let payloads = vec![
        transform_fixture("Printer jam"),
        transform_fixture("VPN down"),
    ];
    write_snapshot(&harness.data_dir().join(TICKET_PAYLOADS_FILE), &payloads).unwrap();
    harness.destination.fail_next_tickets(
        3,
        DestinationError::ApiError {
            status: 500,
            message: "Internal Server Error".to_string(),
        },
    );

    let ctx = harness.context();
    let summary = run_stage(Stage::Post, &ctx, &harness.source, &harness.destination)
        .await
        .expect("Post stage failed");
    drop(ctx);

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(harness.destination.ticket_attempts().len(), 4);

    let artifact = summary.error_artifact.clone().expect("No error artifact");
    let file_name = artifact.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("post-"));
    assert!(artifact.starts_with(&harness.config.paths.error_dir));

    let entries: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["identifier"], "Printer jam");
    assert!(entries[0]["error_message"]
        .as_str()
        .unwrap()
        .contains("500"));

    let records = harness.finish().await;
    assert_eq!(count_events(&records, "ticket_failed"), 1);
    assert_eq!(count_events(&records, "ticket_posted"), 1);
}

#[tokio::test]
async fn test_transform_without_reference_snapshots_is_an_input_error() {
    let harness = TestHarness::new();
    let ctx = harness.context();

    let result = run_stage(Stage::Transform, &ctx, &harness.source, &harness.destination).await;

    match result {
        Err(StageError::Input { stage, .. }) => assert_eq!(stage, Stage::Transform),
        other => panic!("Expected input error, got {:?}", other),
    }
    assert!(!harness.data_dir().join(TICKET_PAYLOADS_FILE).exists());
}

#[tokio::test]
async fn test_notes_stage_skips_tickets_without_id() {
    let harness = TestHarness::new();
    let mut anonymous = fixtures::ticket(0, "No id", None, None);
    anonymous.id = None;
    write_snapshot(
        &harness.data_dir().join("result1.json"),
        &[fixtures::ticket(7, "Has id", None, None), anonymous],
    )
    .unwrap();

    let ctx = harness.context();
    run_stage(Stage::Notes, &ctx, &harness.source, &harness.destination)
        .await
        .expect("Notes stage failed");
    drop(ctx);

    assert_eq!(harness.source.note_requests(), vec![7]);
    let saved: Vec<Ticket> =
        read_snapshot(&harness.data_dir().join(TICKETS_WITH_NOTES_FILE)).unwrap();
    assert_eq!(saved.len(), 2);
    // The throttle runs after every ticket, with or without an id
    assert_eq!(harness.sleeper.delays().len(), 2);
}

fn transform_fixture(title: &str) -> TicketPayload {
    TicketPayload {
        title: Some(title.to_string()),
        description: None,
        priority: "Low".to_string(),
        impact: "Minor".to_string(),
        status: "New".to_string(),
        ticket_type: "Incident".to_string(),
        technician_contact_id: None,
        end_user: None,
        comments: Vec::new(),
    }
}
