//! Types shared by every paginated source.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::Note;

/// Which page to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// The filter-encoded first request.
    First,
    /// An opaque continuation link returned by the server.
    Next(String),
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Link to the following page, `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn with_next(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: Some(next.into()),
        }
    }
}

/// Wire envelope. Query endpoints report the next page under
/// `pageDetails.nextPageUrl`, listing endpoints under `nextLink`.
#[derive(Debug, Deserialize)]
pub struct PageEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(rename = "pageDetails", default)]
    pub page_details: Option<PageDetails>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageDetails {
    #[serde(rename = "nextPageUrl", default)]
    pub next_page_url: Option<String>,
}

impl<T> From<PageEnvelope<T>> for Page<T> {
    fn from(envelope: PageEnvelope<T>) -> Self {
        let next = envelope
            .page_details
            .and_then(|d| d.next_page_url)
            .or(envelope.next_link)
            .filter(|url| !url.trim().is_empty());
        Page {
            items: envelope.items,
            next,
        }
    }
}

/// Equality filter sent to query endpoints:
/// `{"filter":[{"op":"eq","field":<name>,"value":<value>}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub filter: Vec<FilterClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub op: String,
    pub field: String,
    pub value: Value,
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            filter: vec![FilterClause {
                op: "eq".to_string(),
                field: field.into(),
                value: value.into(),
            }],
        }
    }

    /// Short form for logs, e.g. `priority=2`.
    pub fn describe(&self) -> String {
        self.filter
            .iter()
            .map(|c| match &c.value {
                Value::String(s) => format!("{}={}", c.field, s),
                other => format!("{}={}", c.field, other),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Errors that can occur while reading from a source.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout)
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_connect() {
            SourceError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            SourceError::ParseError(e.to_string())
        } else {
            SourceError::RequestFailed(e.to_string())
        }
    }
}

/// A server-side paginated collection.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Human-readable label used in logs and the audit trail.
    fn describe(&self) -> String;

    /// URL a request resolves to, for logging.
    fn url_for(&self, request: &PageRequest) -> String;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, SourceError>;
}

#[async_trait]
impl<T, P> PageSource<T> for Box<P>
where
    T: Send + 'static,
    P: PageSource<T> + ?Sized,
{
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn url_for(&self, request: &PageRequest) -> String {
        (**self).url_for(request)
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, SourceError> {
        (**self).fetch_page(request).await
    }
}

/// The source system as the stages use it.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Paged view of `entity` restricted by `filter`.
    fn query<T>(&self, entity: &str, filter: QueryFilter) -> Box<dyn PageSource<T> + '_>
    where
        T: DeserializeOwned + Send + 'static;

    /// Notes attached to one ticket. Only the first page is returned.
    async fn ticket_notes(&self, ticket_id: i64) -> Result<Page<Note>, SourceError>;
}
