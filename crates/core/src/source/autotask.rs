//! Autotask-style REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SourceConfig;
use crate::model::Note;

use super::{Page, PageEnvelope, PageRequest, PageSource, QueryFilter, SourceApi, SourceError};

/// Entity holding ticket notes.
pub const TICKET_NOTES_ENTITY: &str = "TicketNotes";

/// Client for the source API. Every request carries the three integration
/// credentials as headers.
pub struct AutotaskClient {
    client: Client,
    config: SourceConfig,
}

impl AutotaskClient {
    /// Create a new client with the configured per-request timeout.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SourceError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("ApiIntegrationCode", &self.config.integration_code)
            .header("UserName", &self.config.username)
            .header("Secret", &self.config.secret)
    }

    /// Build the first-page URL for a filtered entity query.
    pub fn build_query_url(&self, entity: &str, filter: &QueryFilter) -> String {
        let search = serde_json::to_string(filter).unwrap_or_default();
        format!(
            "{}/{}/query?search={}",
            self.base_url(),
            urlencoding::encode(entity),
            urlencoding::encode(&search)
        )
    }

    /// A paginated view of `entity` restricted by `filter`.
    pub fn entity_query(&self, entity: &str, filter: QueryFilter) -> EntityQuery<'_> {
        EntityQuery {
            client: self,
            entity: entity.to_string(),
            filter,
        }
    }

    /// GET one page from an absolute URL.
    pub async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>, SourceError> {
        debug!(url = url, "Source GET");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        decode_page(response).await
    }

    /// POST a filter as the JSON body and return the first page of matches.
    pub async fn query_all<T: DeserializeOwned>(
        &self,
        entity: &str,
        filter: &QueryFilter,
    ) -> Result<Page<T>, SourceError> {
        let url = format!("{}/{}/query", self.base_url(), urlencoding::encode(entity));
        debug!(url = %url, filter = %filter.describe(), "Source POST query");

        let response = self
            .authorize(self.client.post(&url))
            .basic_auth(&self.config.username, Some(&self.config.secret))
            .json(filter)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        decode_page(response).await
    }
}

#[async_trait]
impl SourceApi for AutotaskClient {
    fn query<T>(&self, entity: &str, filter: QueryFilter) -> Box<dyn PageSource<T> + '_>
    where
        T: DeserializeOwned + Send + 'static,
    {
        Box::new(self.entity_query(entity, filter))
    }

    async fn ticket_notes(&self, ticket_id: i64) -> Result<Page<Note>, SourceError> {
        self.query_all(TICKET_NOTES_ENTITY, &QueryFilter::eq("ticketID", ticket_id))
            .await
    }
}

/// Turn a page response into a [`Page`], mapping non-2xx statuses to errors.
pub(crate) async fn decode_page<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Page<T>, SourceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::ApiError {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        });
    }

    let envelope: PageEnvelope<T> = response
        .json()
        .await
        .map_err(|e| SourceError::ParseError(e.to_string()))?;

    Ok(envelope.into())
}

/// One filtered query against one entity, paged by the server.
pub struct EntityQuery<'a> {
    client: &'a AutotaskClient,
    entity: String,
    filter: QueryFilter,
}

#[async_trait]
impl<'a, T> PageSource<T> for EntityQuery<'a>
where
    T: DeserializeOwned + Send + 'static,
{
    fn describe(&self) -> String {
        format!("{} {}", self.entity, self.filter.describe())
    }

    fn url_for(&self, request: &PageRequest) -> String {
        match request {
            PageRequest::First => self.client.build_query_url(&self.entity, &self.filter),
            PageRequest::Next(url) => url.clone(),
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, SourceError> {
        let url = PageSource::<T>::url_for(self, request);
        self.client.get_page(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn client(base_url: &str) -> AutotaskClient {
        AutotaskClient::new(SourceConfig {
            base_url: base_url.to_string(),
            integration_code: "code".to_string(),
            username: "user".to_string(),
            secret: "secret".to_string(),
            timeout_secs: 60,
        })
        .unwrap()
    }

    #[test]
    fn test_build_query_url_encodes_filter() {
        let client = client("https://ws.example.com/ATServicesRest/V1.0/");
        let url = client.build_query_url("Tickets", &QueryFilter::eq("priority", 2));
        assert!(url.starts_with("https://ws.example.com/ATServicesRest/V1.0/Tickets/query?search="));
        assert!(url.contains("%22field%22%3A%22priority%22"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_entity_query_urls() {
        let client = client("https://ws.example.com/V1.0");
        let query = client.entity_query("Contacts", QueryFilter::eq("isActive", 1));

        assert_eq!(PageSource::<Value>::describe(&query), "Contacts isActive=1");
        let first = PageSource::<Value>::url_for(&query, &PageRequest::First);
        assert!(first.contains("/Contacts/query?search="));

        let next = PageSource::<Value>::url_for(
            &query,
            &PageRequest::Next("https://ws.example.com/V1.0/Contacts/query/next?paging=abc".into()),
        );
        assert_eq!(next, "https://ws.example.com/V1.0/Contacts/query/next?paging=abc");
    }
}
