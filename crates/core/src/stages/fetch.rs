//! Stages that pull collections from an API into snapshots.

use tracing::{info, warn};

use crate::destination::Destination;
use crate::fetcher::{fetch_all, fetch_for_values, FetchOutcome};
use crate::model::{Contact, DestinationContact, Resource, Ticket};
use crate::reference::{CONTACTS_FILE, DESTINATION_CONTACTS_FILE, RESOURCES_FILE};
use crate::source::{QueryFilter, SourceApi};
use crate::uploader::{upload_contacts, ErrorLedger};

use super::{Stage, StageContext, StageSummary, TICKETS_FILE};

/// `isActive` values walked for contacts and resources.
pub const ACTIVE_STATES: [i64; 2] = [0, 1];
/// Ticket priorities walked by the tickets stage.
pub const TICKET_PRIORITIES: [i64; 4] = [1, 2, 3, 4];

fn count<T>(summary: &mut StageSummary, outcome: &FetchOutcome<T>) {
    summary.succeeded = outcome.items.len();
    if let Some(reason) = &outcome.abandoned {
        summary.failed += 1;
        warn!(stage = %summary.stage, reason = %reason, "Some fetches were incomplete");
    }
}

/// Fetch source contacts, save them, and create each one at the
/// destination.
pub async fn fetch_contacts<S: SourceApi>(
    ctx: &StageContext<'_>,
    source: &S,
    destination: &dyn Destination,
) -> StageSummary {
    let mut summary = StageSummary::new(Stage::Contacts);
    let policy = ctx.retry.fetch.policy();

    let outcome: FetchOutcome<Contact> = fetch_for_values(
        &ACTIVE_STATES,
        |active| source.query::<Contact>("Contacts", QueryFilter::eq("isActive", *active)),
        &policy,
        ctx.sleeper,
        &ctx.audit,
    )
    .await;
    info!(contacts = outcome.items.len(), "Contacts fetched");
    summary.output = ctx.save(CONTACTS_FILE, &outcome.items).await;

    let mut ledger = ErrorLedger::new();
    let report = upload_contacts(&outcome.items, destination, &mut ledger, &ctx.audit).await;

    summary.succeeded = report.succeeded;
    summary.failed = report.failed + usize::from(!outcome.is_complete());
    summary.error_artifact = ctx.persist_errors(&ledger, Stage::Contacts);
    summary
}

/// Fetch source resources into `all_resources.json`.
pub async fn fetch_resources<S: SourceApi>(ctx: &StageContext<'_>, source: &S) -> StageSummary {
    let mut summary = StageSummary::new(Stage::Resources);
    let policy = ctx.retry.fetch.policy();

    let outcome: FetchOutcome<Resource> = fetch_for_values(
        &ACTIVE_STATES,
        |active| source.query::<Resource>("Resources", QueryFilter::eq("isActive", *active)),
        &policy,
        ctx.sleeper,
        &ctx.audit,
    )
    .await;
    count(&mut summary, &outcome);
    summary.output = ctx.save(RESOURCES_FILE, &outcome.items).await;
    summary
}

/// Fetch the destination's existing contacts into `atera_contacts.json`.
/// Nothing is written when none were fetched.
pub async fn fetch_destination_contacts(
    ctx: &StageContext<'_>,
    destination: &dyn Destination,
) -> StageSummary {
    let mut summary = StageSummary::new(Stage::DestinationContacts);
    let policy = ctx.retry.fetch.policy();

    let listing = destination.contacts();
    let outcome: FetchOutcome<DestinationContact> =
        fetch_all(&*listing, &policy, ctx.sleeper, &ctx.audit).await;
    count(&mut summary, &outcome);

    if outcome.items.is_empty() {
        warn!("No contacts were fetched");
    } else {
        summary.output = ctx.save(DESTINATION_CONTACTS_FILE, &outcome.items).await;
    }
    summary
}

/// Fetch source tickets for every priority into `result1.json`.
pub async fn fetch_tickets<S: SourceApi>(ctx: &StageContext<'_>, source: &S) -> StageSummary {
    let mut summary = StageSummary::new(Stage::Tickets);
    let policy = ctx.retry.fetch.policy();

    let outcome: FetchOutcome<Ticket> = fetch_for_values(
        &TICKET_PRIORITIES,
        |priority| source.query::<Ticket>("Tickets", QueryFilter::eq("priority", *priority)),
        &policy,
        ctx.sleeper,
        &ctx.audit,
    )
    .await;
    count(&mut summary, &outcome);
    info!(tickets = outcome.items.len(), "Total tickets fetched");
    summary.output = ctx.save(TICKETS_FILE, &outcome.items).await;
    summary
}
