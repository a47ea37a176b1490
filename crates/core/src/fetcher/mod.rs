//! Paginated fetcher.
//!
//! Walks a [`PageSource`] from its first page along the server's
//! continuation links until none is returned, keeping items in arrival
//! order. Timeouts are retried under a [`RetryPolicy`]; the failure count
//! is kept for the whole walk, not per page. Any other failure abandons the
//! walk at once. An abandoned walk still returns what it gathered.

use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::retry::{RetryPolicy, Sleeper};
use crate::source::{PageRequest, PageSource};

/// Result of walking one paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub items: Vec<T>,
    /// Pages successfully received.
    pub pages: u32,
    /// Requests issued, including failed ones.
    pub attempts: u32,
    /// Why the walk stopped early, if it did.
    pub abandoned: Option<String>,
}

impl<T> FetchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_none()
    }
}

/// Fetch every page of `source`.
pub async fn fetch_all<T, S>(
    source: &S,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    audit: &AuditHandle,
) -> FetchOutcome<T>
where
    S: PageSource<T> + ?Sized,
{
    let label = source.describe();
    let mut items = Vec::new();
    let mut pages = 0u32;
    let mut attempts = 0u32;
    let mut failures = 0u32;
    let mut request = PageRequest::First;

    loop {
        let url = source.url_for(&request);
        attempts += 1;
        info!(fetch = %label, url = %url, attempt = attempts, "Requesting page");
        audit
            .emit(AuditEvent::PageRequested {
                fetch: label.clone(),
                url: url.clone(),
                attempt: attempts,
            })
            .await;

        match source.fetch_page(&request).await {
            Ok(page) => {
                pages += 1;
                items.extend(page.items);
                match page.next {
                    Some(next) => request = PageRequest::Next(next),
                    None => {
                        info!(fetch = %label, pages, items = items.len(), "No more pages");
                        audit
                            .emit(AuditEvent::FetchCompleted {
                                fetch: label,
                                pages,
                                items: items.len(),
                            })
                            .await;
                        return FetchOutcome {
                            items,
                            pages,
                            attempts,
                            abandoned: None,
                        };
                    }
                }
            }
            Err(e) if e.is_timeout() => {
                failures += 1;
                let will_retry = policy.should_retry(failures);
                warn!(
                    fetch = %label,
                    failures,
                    max_attempts = policy.max_attempts,
                    "Timeout occurred"
                );
                audit
                    .emit(AuditEvent::PageFailed {
                        fetch: label.clone(),
                        url,
                        attempt: attempts,
                        error: e.to_string(),
                        will_retry,
                    })
                    .await;

                if !will_retry {
                    let reason = format!("max retries reached after {} timeouts", failures);
                    return abandon(audit, label, reason, items, pages, attempts).await;
                }
                sleeper.sleep(policy.delay_for(failures)).await;
            }
            Err(e) => {
                audit
                    .emit(AuditEvent::PageFailed {
                        fetch: label.clone(),
                        url,
                        attempt: attempts,
                        error: e.to_string(),
                        will_retry: false,
                    })
                    .await;
                let reason = format!("request failed: {}", e);
                return abandon(audit, label, reason, items, pages, attempts).await;
            }
        }
    }
}

/// Fetch one source per filter value, one after another, concatenating
/// results in value order.
pub async fn fetch_for_values<T, V, S, F>(
    values: &[V],
    make_source: F,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    audit: &AuditHandle,
) -> FetchOutcome<T>
where
    S: PageSource<T>,
    F: Fn(&V) -> S,
{
    let mut combined = FetchOutcome {
        items: Vec::new(),
        pages: 0,
        attempts: 0,
        abandoned: None,
    };
    let mut abandoned = Vec::new();

    for value in values {
        let source = make_source(value);
        let label = source.describe();
        let outcome = fetch_all(&source, policy, sleeper, audit).await;
        info!(fetch = %label, fetched = outcome.items.len(), "Fetched filter value");
        combined.items.extend(outcome.items);
        combined.pages += outcome.pages;
        combined.attempts += outcome.attempts;
        if let Some(reason) = outcome.abandoned {
            abandoned.push(format!("{}: {}", label, reason));
        }
    }

    if !abandoned.is_empty() {
        combined.abandoned = Some(abandoned.join("; "));
    }
    combined
}

async fn abandon<T>(
    audit: &AuditHandle,
    label: String,
    reason: String,
    items: Vec<T>,
    pages: u32,
    attempts: u32,
) -> FetchOutcome<T> {
    error!(fetch = %label, reason = %reason, kept = items.len(), "Skipping this fetch");
    audit
        .emit(AuditEvent::FetchAbandoned {
            fetch: label,
            reason: reason.clone(),
            items_kept: items.len(),
        })
        .await;
    FetchOutcome {
        items,
        pages,
        attempts,
        abandoned: Some(reason),
    }
}
