//! Writes to the destination API.

mod atera;

pub use atera::{AteraClient, DestinationContactsSource};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    CommentPayload, DestinationContact, DestinationContactPayload, DestinationId, TicketPayload,
};
use crate::source::PageSource;

/// Errors that can occur when writing to the destination.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DestinationError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Ticket ID not found in the response")]
    MissingTicketId,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl DestinationError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DestinationError::Timeout
        } else if e.is_connect() {
            DestinationError::ConnectionFailed(e.to_string())
        } else {
            DestinationError::RequestFailed(e.to_string())
        }
    }
}

/// Create operations on the destination system.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Paged listing of the end-user contacts that already exist.
    fn contacts(&self) -> Box<dyn PageSource<DestinationContact> + '_>;

    /// Create an end-user contact.
    async fn post_contact(
        &self,
        contact: &DestinationContactPayload,
    ) -> Result<(), DestinationError>;

    /// Create a ticket, returning the id the destination assigned.
    async fn post_ticket(&self, ticket: &TicketPayload) -> Result<DestinationId, DestinationError>;

    /// Add a comment to an existing ticket.
    async fn post_comment(
        &self,
        ticket_id: &DestinationId,
        comment: &CommentPayload,
    ) -> Result<(), DestinationError>;
}
