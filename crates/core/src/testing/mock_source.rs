//! Mock source API for testing.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::model::Note;
use crate::source::{Page, PageRequest, PageSource, QueryFilter, SourceApi, SourceError};

type Scripted<T> = Result<Page<T>, SourceError>;

/// A paged collection that replays scripted responses in order.
///
/// Every request is recorded, so tests can assert which links were
/// followed. Once the script runs out, further requests fail with
/// `RequestFailed`.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockPageSource::new("Tickets priority=1", vec![
///     Ok(Page::with_next(vec![1, 2], "p2")),
///     Err(SourceError::Timeout),
///     Ok(Page::last(vec![3])),
/// ]);
/// ```
pub struct MockPageSource<T> {
    label: String,
    responses: Mutex<VecDeque<Scripted<T>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl<T> MockPageSource<T> {
    pub fn new(label: impl Into<String>, responses: Vec<Scripted<T>>) -> Self {
        Self {
            label: label.into(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl<T> std::fmt::Debug for MockPageSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPageSource")
            .field("label", &self.label)
            .field("requests", &self.requests())
            .finish()
    }
}

#[async_trait]
impl<T: Send + 'static> PageSource<T> for MockPageSource<T> {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn url_for(&self, request: &PageRequest) -> String {
        match request {
            PageRequest::First => format!("mock://{}", self.label.replace(' ', "/")),
            PageRequest::Next(url) => url.clone(),
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, SourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| {
                Err(SourceError::RequestFailed(format!(
                    "no scripted response left for {}",
                    self.label
                )))
            })
    }
}

/// Mock of the whole source system.
///
/// Query responses are scripted as raw JSON pages keyed by the query label
/// (`"<entity> <field>=<value>"`), so records go through the same
/// deserialisation as real responses. Unscripted queries return a single
/// empty page.
#[derive(Default)]
pub struct MockSourceApi {
    queries: Mutex<HashMap<String, Vec<Scripted<Value>>>>,
    notes: Mutex<HashMap<i64, VecDeque<Result<Page<Note>, SourceError>>>>,
    queried: Mutex<Vec<String>>,
    note_requests: Mutex<Vec<i64>>,
}

impl MockSourceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the pages returned for one query label.
    pub fn set_pages(&self, label: impl Into<String>, pages: Vec<Scripted<Value>>) {
        if let Ok(mut queries) = self.queries.lock() {
            queries.insert(label.into(), pages);
        }
    }

    /// Script a single page of `items` for one query label.
    pub fn set_items(&self, label: impl Into<String>, items: Vec<Value>) {
        self.set_pages(label, vec![Ok(Page::last(items))]);
    }

    /// Queue a notes response for a ticket. Tickets without queued responses
    /// have no notes.
    pub fn push_notes(&self, ticket_id: i64, response: Result<Vec<Note>, SourceError>) {
        if let Ok(mut notes) = self.notes.lock() {
            notes
                .entry(ticket_id)
                .or_default()
                .push_back(response.map(Page::last));
        }
    }

    /// Labels of the queries that were opened, in order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Ticket ids whose notes were requested, one entry per attempt.
    pub fn note_requests(&self) -> Vec<i64> {
        self.note_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

fn decode_items<T: DeserializeOwned>(page: Page<Value>) -> Result<Page<T>, SourceError> {
    let items = page
        .items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| SourceError::ParseError(e.to_string()))?;
    Ok(Page {
        items,
        next: page.next,
    })
}

#[async_trait]
impl SourceApi for MockSourceApi {
    fn query<T>(&self, entity: &str, filter: QueryFilter) -> Box<dyn PageSource<T> + '_>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let label = format!("{} {}", entity, filter.describe());
        if let Ok(mut queried) = self.queried.lock() {
            queried.push(label.clone());
        }
        let scripted = self
            .queries
            .lock()
            .ok()
            .and_then(|q| q.get(&label).cloned())
            .unwrap_or_else(|| vec![Ok(Page::last(Vec::new()))]);
        let responses: Vec<Scripted<T>> = scripted
            .into_iter()
            .map(|r| r.and_then(decode_items::<T>))
            .collect();
        Box::new(MockPageSource::new(label, responses))
    }

    async fn ticket_notes(&self, ticket_id: i64) -> Result<Page<Note>, SourceError> {
        if let Ok(mut requests) = self.note_requests.lock() {
            requests.push(ticket_id);
        }
        self.notes
            .lock()
            .ok()
            .and_then(|mut n| n.get_mut(&ticket_id).and_then(|q| q.pop_front()))
            .unwrap_or_else(|| Ok(Page::last(Vec::new())))
    }
}
