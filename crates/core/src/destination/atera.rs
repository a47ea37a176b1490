//! Atera-style REST client.
//!
//! Contact endpoints authenticate with an `X-API-KEY` header, ticket and
//! comment endpoints with a bearer token carrying the same key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DestinationConfig;
use crate::model::{
    CommentPayload, DestinationContact, DestinationContactPayload, DestinationId, TicketPayload,
};
use crate::source::{decode_page, Page, PageRequest, PageSource, SourceError};

use super::{Destination, DestinationError};

pub struct AteraClient {
    client: Client,
    config: DestinationConfig,
}

impl AteraClient {
    pub fn new(config: DestinationConfig) -> Result<Self, DestinationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| {
                DestinationError::RequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub fn contacts_url(&self) -> String {
        format!("{}/contacts", self.base_url())
    }

    pub fn tickets_url(&self) -> String {
        format!("{}/tickets", self.base_url())
    }

    pub fn comments_url(&self, ticket_id: &DestinationId) -> String {
        format!(
            "{}/tickets/{}/comments",
            self.base_url(),
            urlencoding::encode(&ticket_id.to_string())
        )
    }

    /// Paginated listing of the destination's existing contacts.
    pub fn contacts_source(&self) -> DestinationContactsSource<'_> {
        DestinationContactsSource { client: self }
    }

    async fn post_json_with_key<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Response, DestinationError> {
        let response = self
            .client
            .post(url)
            .header("X-API-KEY", &self.config.api_key)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(DestinationError::from_reqwest)?;
        ensure_success(response).await
    }

    async fn post_json_with_bearer<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Response, DestinationError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(DestinationError::from_reqwest)?;
        ensure_success(response).await
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>, SourceError> {
        debug!(url = url, "Destination GET");
        let response = self
            .client
            .get(url)
            .header("X-API-KEY", &self.config.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        decode_page(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, DestinationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DestinationError::ApiError {
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    })
}

#[derive(Debug, Deserialize)]
struct CreatedTicket {
    #[serde(default)]
    id: Option<DestinationId>,
}

/// Extract the new ticket id from a create response body.
fn parse_created_ticket(body: &str) -> Result<DestinationId, DestinationError> {
    let created: CreatedTicket =
        serde_json::from_str(body).map_err(|e| DestinationError::ParseError(e.to_string()))?;
    match created.id {
        Some(DestinationId::Number(0)) | None => Err(DestinationError::MissingTicketId),
        Some(DestinationId::Text(ref s)) if s.is_empty() => Err(DestinationError::MissingTicketId),
        Some(id) => Ok(id),
    }
}

#[async_trait]
impl Destination for AteraClient {
    fn contacts(&self) -> Box<dyn PageSource<DestinationContact> + '_> {
        Box::new(self.contacts_source())
    }

    async fn post_contact(
        &self,
        contact: &DestinationContactPayload,
    ) -> Result<(), DestinationError> {
        self.post_json_with_key(&self.contacts_url(), contact)
            .await
            .map(|_| ())
    }

    async fn post_ticket(&self, ticket: &TicketPayload) -> Result<DestinationId, DestinationError> {
        let response = self.post_json_with_bearer(&self.tickets_url(), ticket).await?;
        let body = response
            .text()
            .await
            .map_err(|e| DestinationError::ParseError(e.to_string()))?;
        parse_created_ticket(&body)
    }

    async fn post_comment(
        &self,
        ticket_id: &DestinationId,
        comment: &CommentPayload,
    ) -> Result<(), DestinationError> {
        self.post_json_with_bearer(&self.comments_url(ticket_id), comment)
            .await
            .map(|_| ())
    }
}

/// Listing of destination contacts, paged by `nextLink`.
pub struct DestinationContactsSource<'a> {
    client: &'a AteraClient,
}

#[async_trait]
impl<'a, T> PageSource<T> for DestinationContactsSource<'a>
where
    T: DeserializeOwned + Send + 'static,
{
    fn describe(&self) -> String {
        "destination contacts".to_string()
    }

    fn url_for(&self, request: &PageRequest) -> String {
        match request {
            PageRequest::First => self.client.contacts_url(),
            PageRequest::Next(url) => url.clone(),
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, SourceError> {
        let url = PageSource::<T>::url_for(self, request);
        self.client.get_page(&url).await
    }
}
