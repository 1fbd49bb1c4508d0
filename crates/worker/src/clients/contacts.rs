//! OpenWeb Ninja website contacts scraper.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{build_http_client, ensure_success, normalize_url, ClientError};

/// Credential service name for this API.
pub const SERVICE: &str = "openwebninja";

pub const API_URL: &str = "https://api.openwebninja.com/website-contacts-scraper/scrape-contacts";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of scraped contact details for a website.
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// The first contacts record for `website`, or `None` when the service
    /// found nothing.
    async fn scrape_contacts(
        &self,
        api_key: &str,
        website: &str,
    ) -> Result<Option<serde_json::Value>, ClientError>;
}

/// Envelope returned by the scraper: `{"status": "OK", "data": [...]}`.
#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    status: Option<String>,
    /// Absent, `null` and `[]` all mean nothing was found.
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
}

impl ScrapeResponse {
    fn first_record(self) -> Option<serde_json::Value> {
        if self.status.as_deref() != Some("OK") {
            return None;
        }
        self.data?.into_iter().next()
    }
}

pub struct OpenWebNinjaClient {
    client: reqwest::Client,
    api_url: String,
}

impl OpenWebNinjaClient {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self::with_client(
            build_http_client(REQUEST_TIMEOUT, None)?,
            API_URL.to_string(),
        ))
    }

    /// Reuse an existing client, e.g. to point at a different endpoint.
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }
}

#[async_trait]
impl ContactSource for OpenWebNinjaClient {
    async fn scrape_contacts(
        &self,
        api_key: &str,
        website: &str,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        let website = normalize_url(website);
        let response = self
            .client
            .get(&self.api_url)
            .header("x-api-key", api_key)
            .query(&[("query", website.as_str())])
            .send()
            .await?;

        let body: ScrapeResponse = ensure_success(response).await?.json().await?;
        Ok(body.first_record())
    }
}
