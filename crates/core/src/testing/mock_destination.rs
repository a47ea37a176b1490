//! Mock destination for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::destination::{Destination, DestinationError};
use crate::model::{
    CommentPayload, DestinationContact, DestinationContactPayload, DestinationId, TicketPayload,
};
use crate::source::{Page, PageSource, SourceError};

use super::MockPageSource;

/// Mock implementation of the Destination trait.
///
/// Every call is recorded, failed ones included. Results are scripted per
/// operation as a queue; once a queue is empty calls succeed, and created
/// tickets get ids counting up from 1000.
///
/// # Example
///
/// ```rust,ignore
/// let dest = MockDestination::new();
/// dest.push_ticket_result(Err(DestinationError::Timeout));
///
/// // First attempt times out, the retry gets id 1000
/// let outcome = post_ticket(&dest, &payload, &policy, &sleeper, &audit).await;
/// assert_eq!(dest.ticket_attempts().len(), 2);
/// ```
pub struct MockDestination {
    contact_results: Mutex<VecDeque<Result<(), DestinationError>>>,
    ticket_results: Mutex<VecDeque<Result<DestinationId, DestinationError>>>,
    comment_results: Mutex<VecDeque<Result<(), DestinationError>>>,
    contact_pages: Mutex<Vec<Result<Page<DestinationContact>, SourceError>>>,
    contacts: Mutex<Vec<DestinationContactPayload>>,
    tickets: Mutex<Vec<TicketPayload>>,
    comments: Mutex<Vec<(DestinationId, CommentPayload)>>,
    next_id: AtomicI64,
}

impl Default for MockDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDestination {
    pub fn new() -> Self {
        Self {
            contact_results: Mutex::new(VecDeque::new()),
            ticket_results: Mutex::new(VecDeque::new()),
            comment_results: Mutex::new(VecDeque::new()),
            contact_pages: Mutex::new(vec![Ok(Page::last(Vec::new()))]),
            contacts: Mutex::new(Vec::new()),
            tickets: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn push_contact_result(&self, result: Result<(), DestinationError>) {
        push(&self.contact_results, result);
    }

    pub fn push_ticket_result(&self, result: Result<DestinationId, DestinationError>) {
        push(&self.ticket_results, result);
    }

    /// Make the next `n` ticket posts fail with `error`.
    pub fn fail_next_tickets(&self, n: usize, error: DestinationError) {
        for _ in 0..n {
            self.push_ticket_result(Err(error.clone()));
        }
    }

    pub fn push_comment_result(&self, result: Result<(), DestinationError>) {
        push(&self.comment_results, result);
    }

    /// Script the pages of the existing-contacts listing.
    pub fn set_contact_pages(&self, pages: Vec<Result<Page<DestinationContact>, SourceError>>) {
        if let Ok(mut current) = self.contact_pages.lock() {
            *current = pages;
        }
    }

    /// Contact payloads received, in order.
    pub fn posted_contacts(&self) -> Vec<DestinationContactPayload> {
        snapshot(&self.contacts)
    }

    /// Ticket payloads received, one entry per attempt.
    pub fn ticket_attempts(&self) -> Vec<TicketPayload> {
        snapshot(&self.tickets)
    }

    /// Comments received with the ticket they were posted to.
    pub fn posted_comments(&self) -> Vec<(DestinationId, CommentPayload)> {
        snapshot(&self.comments)
    }
}

fn push<T>(queue: &Mutex<VecDeque<T>>, item: T) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(item);
    }
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

fn record<T>(log: &Mutex<Vec<T>>, item: T) {
    if let Ok(mut log) = log.lock() {
        log.push(item);
    }
}

fn snapshot<T: Clone>(log: &Mutex<Vec<T>>) -> Vec<T> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}

impl std::fmt::Debug for MockDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDestination")
            .field("contacts", &self.posted_contacts().len())
            .field("ticket_attempts", &self.ticket_attempts().len())
            .field("comments", &self.posted_comments().len())
            .finish()
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn contacts(&self) -> Box<dyn PageSource<DestinationContact> + '_> {
        let pages = snapshot(&self.contact_pages);
        Box::new(MockPageSource::new("destination contacts", pages))
    }

    async fn post_contact(
        &self,
        contact: &DestinationContactPayload,
    ) -> Result<(), DestinationError> {
        record(&self.contacts, contact.clone());
        pop(&self.contact_results).unwrap_or(Ok(()))
    }

    async fn post_ticket(&self, ticket: &TicketPayload) -> Result<DestinationId, DestinationError> {
        record(&self.tickets, ticket.clone());
        pop(&self.ticket_results).unwrap_or_else(|| {
            Ok(DestinationId::Number(
                self.next_id.fetch_add(1, Ordering::SeqCst),
            ))
        })
    }

    async fn post_comment(
        &self,
        ticket_id: &DestinationId,
        comment: &CommentPayload,
    ) -> Result<(), DestinationError> {
        record(&self.comments, (ticket_id.clone(), comment.clone()));
        pop(&self.comment_results).unwrap_or(Ok(()))
    }
}
