//! Notes stage: attach each ticket's notes.

use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::model::{Note, Ticket};
use crate::retry::{RetryPolicy, Sleeper};
use crate::source::{SourceApi, SourceError, TICKET_NOTES_ENTITY};
use crate::uploader::{ErrorLedger, FailureRecord};

use super::{
    read_input, Stage, StageContext, StageError, StageSummary, TICKETS_FILE,
    TICKETS_WITH_NOTES_FILE,
};

fn is_transient(e: &SourceError) -> bool {
    matches!(
        e,
        SourceError::Timeout | SourceError::ConnectionFailed(_) | SourceError::RequestFailed(_)
    )
}

/// Query the notes of one ticket.
///
/// Timeouts and transport failures are retried under `policy`; the last
/// such error is returned once attempts run out. API and parse errors are
/// returned at once.
pub async fn attach_notes<S: SourceApi>(
    source: &S,
    ticket_id: i64,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    audit: &AuditHandle,
) -> Result<Vec<Note>, SourceError> {
    let label = format!("{} ticketID={}", TICKET_NOTES_ENTITY, ticket_id);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(ticket_id, attempt, "Sending notes request");
        audit
            .emit(AuditEvent::PageRequested {
                fetch: label.clone(),
                url: TICKET_NOTES_ENTITY.to_string(),
                attempt,
            })
            .await;

        match source.ticket_notes(ticket_id).await {
            Ok(page) => {
                if page.next.is_some() {
                    warn!(ticket_id, "Ticket has more notes than one page; only the first page is kept");
                }
                return Ok(page.items);
            }
            Err(e) => {
                let will_retry = is_transient(&e) && policy.should_retry(attempt);
                audit
                    .emit(AuditEvent::PageFailed {
                        fetch: label.clone(),
                        url: TICKET_NOTES_ENTITY.to_string(),
                        attempt,
                        error: e.to_string(),
                        will_retry,
                    })
                    .await;

                if !is_transient(&e) {
                    error!(ticket_id, error = %e, "Error fetching notes for ticket");
                    return Err(e);
                }
                if !will_retry {
                    error!(ticket_id, attempts = attempt, error = %e, "Giving up on ticket notes");
                    return Err(e);
                }
                warn!(ticket_id, attempt, error = %e, "Request error for ticket, retrying");
                sleeper.sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}

/// Read `result1.json`, attach notes to every ticket that has an id, and
/// save the result as `result2.json`.
pub async fn fetch_ticket_notes<S: SourceApi>(
    ctx: &StageContext<'_>,
    source: &S,
) -> Result<StageSummary, StageError> {
    let mut tickets: Vec<Ticket> = read_input(Stage::Notes, &ctx.data_path(TICKETS_FILE))?;
    let mut summary = StageSummary::new(Stage::Notes);
    let mut ledger = ErrorLedger::new();
    let policy = ctx.retry.notes.policy();
    let throttle = ctx.note_throttle();

    for (index, ticket) in tickets.iter_mut().enumerate() {
        info!(processed = index + 1, "Tickets processed");
        if let Some(ticket_id) = ticket.id {
            match attach_notes(source, ticket_id, &policy, ctx.sleeper, &ctx.audit).await {
                Ok(notes) => {
                    ticket.notes = Some(notes);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    ticket.notes = Some(Vec::new());
                    summary.failed += 1;
                    ledger.record(FailureRecord::new(
                        ticket
                            .title
                            .clone()
                            .unwrap_or_else(|| format!("ticket {}", ticket_id)),
                        Some(ticket_id),
                        e,
                    ));
                }
            }
        }
        ctx.sleeper.sleep(throttle).await;
    }

    summary.output = ctx.save(TICKETS_WITH_NOTES_FILE, &tickets).await;
    summary.error_artifact = ctx.persist_errors(&ledger, Stage::Notes);
    info!(tickets = tickets.len(), "Processed tickets");
    Ok(summary)
}
