//! Website-builder API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use landingsync_shared::{LandingSyncError, PageRow, Result, RunConfig, Secret};

/// User-Agent string for publishing requests.
const USER_AGENT: &str = concat!("landingsync/", env!("CARGO_PKG_VERSION"));

/// Default timeout in seconds for publishing requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Raw answer from the platform: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResponse {
    pub status: u16,
    pub body: String,
}

impl PlatformResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Row creation and site publishing on a website builder.
///
/// Implementations return `Err` only for transport failures
/// ([`LandingSyncError::Network`]); any HTTP status is an `Ok` response.
#[async_trait]
pub trait PublishingPlatform: Send + Sync {
    /// Append `rows` to the site's dynamic-content collection in one call.
    async fn create_rows(
        &self,
        site_id: &str,
        collection: &str,
        rows: &[PageRow],
    ) -> Result<PlatformResponse>;

    /// Publish the site so new rows go live.
    async fn publish_site(&self, site_id: &str) -> Result<PlatformResponse>;
}

// ---------------------------------------------------------------------------
// Duda
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RowBody<'a> {
    page_item_url: &'a str,
    data: RowData<'a>,
}

#[derive(Debug, Serialize)]
struct RowData<'a> {
    #[serde(rename = "Location Name")]
    name: &'a str,
    #[serde(rename = "Location Description")]
    description: &'a str,
}

impl<'a> From<&'a PageRow> for RowBody<'a> {
    fn from(row: &'a PageRow) -> Self {
        Self {
            page_item_url: &row.identifier,
            data: RowData {
                name: &row.heading,
                description: &row.body,
            },
        }
    }
}

/// [`PublishingPlatform`] for the Duda partner API.
pub struct DudaClient {
    client: Client,
    user: Secret,
    pass: Secret,
    base: String,
}

impl DudaClient {
    /// Create a client for `base_url` (e.g. `https://api.duda.co/api`).
    pub fn new(user: Secret, pass: Secret, base_url: &Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LandingSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            user,
            pass,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_run_config(config: &RunConfig) -> Result<Self> {
        Self::new(
            config.duda_api_user.clone(),
            config.duda_api_pass.clone(),
            &config.duda_base_url,
        )
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<PlatformResponse> {
        let response = request
            .basic_auth(self.user.expose(), Some(self.pass.expose()))
            .send()
            .await
            .map_err(|e| LandingSyncError::Network(format!("POST {url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LandingSyncError::Network(format!("reading response from {url}: {e}")))?;

        debug!(status, bytes = body.len(), "platform responded");
        Ok(PlatformResponse { status, body })
    }
}

#[async_trait]
impl PublishingPlatform for DudaClient {
    #[instrument(skip_all, fields(site_id = %site_id, collection = %collection, rows = rows.len()))]
    async fn create_rows(
        &self,
        site_id: &str,
        collection: &str,
        rows: &[PageRow],
    ) -> Result<PlatformResponse> {
        let url = format!(
            "{}/sites/multiscreen/{site_id}/collection/{collection}/row",
            self.base
        );
        let body: Vec<RowBody<'_>> = rows.iter().map(RowBody::from).collect();
        self.send(self.client.post(&url).json(&body), &url).await
    }

    #[instrument(skip_all, fields(site_id = %site_id))]
    async fn publish_site(&self, site_id: &str) -> Result<PlatformResponse> {
        let url = format!("{}/sites/multiscreen/publish/{site_id}", self.base);
        self.send(self.client.post(&url), &url).await
    }
}
