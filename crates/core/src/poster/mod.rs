//! Ticket poster.
//!
//! Each ticket moves `Pending` to `Posted(id)` or `Failed`. Ticket creation
//! is retried under a [`RetryPolicy`] on any failure. Comments are only
//! posted once the ticket exists, each on its own: a failed comment is
//! recorded and the next one is still sent.

use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::destination::Destination;
use crate::model::{DestinationId, TicketPayload};
use crate::retry::{RetryPolicy, Sleeper};
use crate::uploader::{ErrorLedger, FailureRecord};

/// Where a ticket is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostState {
    Pending,
    Posted(DestinationId),
    Failed,
}

/// Result of posting one ticket and its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketOutcome {
    pub title: String,
    pub state: PostState,
    /// Ticket creation attempts made.
    pub attempts: u32,
    pub comments_posted: usize,
    pub comments_failed: usize,
    /// Last ticket creation error, kept when the ticket failed.
    pub last_error: Option<String>,
    /// Comment errors, in comment order.
    pub comment_errors: Vec<String>,
}

/// Totals for a batch of tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    pub posted: usize,
    pub failed: usize,
    pub comments_posted: usize,
    pub comments_failed: usize,
}

/// Post one ticket, then its comments.
pub async fn post_ticket(
    destination: &dyn Destination,
    payload: &TicketPayload,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    audit: &AuditHandle,
) -> TicketOutcome {
    let title = payload.display_title().to_string();
    let mut outcome = TicketOutcome {
        title: title.clone(),
        state: PostState::Pending,
        attempts: 0,
        comments_posted: 0,
        comments_failed: 0,
        last_error: None,
        comment_errors: Vec::new(),
    };

    while outcome.state == PostState::Pending {
        outcome.attempts += 1;
        match destination.post_ticket(payload).await {
            Ok(id) => {
                info!(ticket = %title, ticket_id = %id, "Successfully posted ticket");
                audit
                    .emit(AuditEvent::TicketPosted {
                        title: title.clone(),
                        ticket_id: id.to_string(),
                        attempts: outcome.attempts,
                    })
                    .await;
                outcome.state = PostState::Posted(id);
                outcome.last_error = None;
            }
            Err(e) => {
                warn!(ticket = %title, attempt = outcome.attempts, error = %e, "Error posting ticket");
                audit
                    .emit(AuditEvent::TicketAttemptFailed {
                        title: title.clone(),
                        attempt: outcome.attempts,
                        error: e.to_string(),
                    })
                    .await;
                outcome.last_error = Some(e.to_string());

                if policy.should_retry(outcome.attempts) {
                    info!(
                        "Retrying... ({}/{})",
                        outcome.attempts, policy.max_attempts
                    );
                    sleeper.sleep(policy.delay_for(outcome.attempts)).await;
                } else {
                    error!(
                        ticket = %title,
                        attempts = outcome.attempts,
                        "Failed to post ticket after all attempts"
                    );
                    audit
                        .emit(AuditEvent::TicketFailed {
                            title: title.clone(),
                            attempts: outcome.attempts,
                            error: e.to_string(),
                        })
                        .await;
                    outcome.state = PostState::Failed;
                }
            }
        }
    }

    if let PostState::Posted(ticket_id) = &outcome.state {
        for comment in &payload.comments {
            match destination.post_comment(ticket_id, comment).await {
                Ok(()) => {
                    outcome.comments_posted += 1;
                    info!(ticket_id = %ticket_id, "Successfully posted comment");
                    audit
                        .emit(AuditEvent::CommentPosted {
                            ticket_id: ticket_id.to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    outcome.comments_failed += 1;
                    error!(ticket_id = %ticket_id, error = %e, "Error posting comment");
                    audit
                        .emit(AuditEvent::CommentFailed {
                            ticket_id: ticket_id.to_string(),
                            error: e.to_string(),
                        })
                        .await;
                    outcome.comment_errors.push(e.to_string());
                }
            }
        }
    }

    outcome
}

/// Post tickets in order. Failed tickets and failed comments are recorded
/// in `ledger`.
pub async fn post_all(
    destination: &dyn Destination,
    payloads: &[TicketPayload],
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    ledger: &mut ErrorLedger,
    audit: &AuditHandle,
) -> (Vec<TicketOutcome>, PostReport) {
    let mut outcomes = Vec::with_capacity(payloads.len());
    let mut report = PostReport::default();

    for payload in payloads {
        let outcome = post_ticket(destination, payload, policy, sleeper, audit).await;

        match &outcome.state {
            PostState::Posted(id) => {
                report.posted += 1;
                for err in &outcome.comment_errors {
                    ledger.record(FailureRecord::new(
                        format!("{} (comment on ticket {})", outcome.title, id),
                        None,
                        err,
                    ));
                }
            }
            PostState::Failed | PostState::Pending => {
                report.failed += 1;
                ledger.record(FailureRecord::new(
                    outcome.title.clone(),
                    None,
                    outcome.last_error.as_deref().unwrap_or("unknown error"),
                ));
            }
        }
        report.comments_posted += outcome.comments_posted;
        report.comments_failed += outcome.comments_failed;
        outcomes.push(outcome);
    }

    (outcomes, report)
}
