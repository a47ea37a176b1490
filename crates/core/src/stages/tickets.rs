//! Transform and post stages.

use tracing::info;

use crate::destination::Destination;
use crate::model::{Ticket, TicketPayload};
use crate::poster::post_all;
use crate::reference::ReferenceSet;
use crate::transform::transform_all;
use crate::uploader::ErrorLedger;

use super::{
    read_input, Stage, StageContext, StageError, StageSummary, TICKETS_WITH_NOTES_FILE,
    TICKET_PAYLOADS_FILE,
};

/// Turn `result2.json` into destination payloads in `result3.json`, using
/// the reference snapshots in the data directory.
pub async fn transform_tickets(ctx: &StageContext<'_>) -> Result<StageSummary, StageError> {
    let refs = ReferenceSet::load(&ctx.data_dir).map_err(|source| StageError::Input {
        stage: Stage::Transform,
        source,
    })?;
    let tickets: Vec<Ticket> =
        read_input(Stage::Transform, &ctx.data_path(TICKETS_WITH_NOTES_FILE))?;

    let payloads = transform_all(&tickets, &refs);
    info!(tickets = payloads.len(), "Processed tickets");

    let mut summary = StageSummary::new(Stage::Transform);
    summary.succeeded = payloads.len();
    summary.output = ctx.save(TICKET_PAYLOADS_FILE, &payloads).await;
    Ok(summary)
}

/// Post every payload in `result3.json` with its comments.
pub async fn post_tickets(
    ctx: &StageContext<'_>,
    destination: &dyn Destination,
) -> Result<StageSummary, StageError> {
    let payloads: Vec<TicketPayload> =
        read_input(Stage::Post, &ctx.data_path(TICKET_PAYLOADS_FILE))?;
    let policy = ctx.retry.ticket_post.policy();
    let mut ledger = ErrorLedger::new();

    let (_, report) = post_all(
        destination,
        &payloads,
        &policy,
        ctx.sleeper,
        &mut ledger,
        &ctx.audit,
    )
    .await;
    info!(
        posted = report.posted,
        failed = report.failed,
        comments_posted = report.comments_posted,
        comments_failed = report.comments_failed,
        "Tickets posted"
    );

    let mut summary = StageSummary::new(Stage::Post);
    summary.succeeded = report.posted;
    summary.failed = report.failed;
    summary.error_artifact = ctx.persist_errors(&ledger, Stage::Post);
    Ok(summary)
}
