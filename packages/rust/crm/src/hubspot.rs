//! HubSpot CRM v3 objects client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use landingsync_shared::{LandingSyncError, Result, RunConfig, Secret};

use crate::{AssociatedObject, CrmClient, CrmRecord};

/// User-Agent string for CRM requests.
const USER_AGENT: &str = concat!("landingsync/", env!("CARGO_PKG_VERSION"));

/// Default timeout in seconds for CRM requests.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AssociationsResponse {
    #[serde(default)]
    results: Vec<AssociationEntry>,
}

#[derive(Debug, Deserialize)]
struct AssociationEntry {
    id: Value,
}

/// [`CrmClient`] over `{base_url}/crm/v3/objects`.
pub struct HubSpotClient {
    client: Client,
    token: Secret,
    base: String,
}

impl HubSpotClient {
    pub fn new(token: Secret, base_url: &Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LandingSyncError::lookup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build from a run resolved with the CRM token.
    pub fn from_run_config(config: &RunConfig) -> Result<Self> {
        Self::new(config.hubspot_api_key()?.clone(), &config.hubspot_base_url)
    }

    async fn send_get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose())
            .query(query)
            .send()
            .await
            .map_err(|e| LandingSyncError::lookup(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LandingSyncError::lookup(format!("{url} not found")));
        }
        if !status.is_success() {
            return Err(LandingSyncError::lookup(format!(
                "{url} returned HTTP {status}"
            )));
        }
        Ok(response)
    }
}

/// Render a JSON property value as text. Null yields `None`.
fn property_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl CrmClient for HubSpotClient {
    #[instrument(skip_all, fields(kind = %kind, id = %id))]
    async fn get_record(&self, kind: &str, id: &str, properties: &[&str]) -> Result<CrmRecord> {
        let url = format!("{}/crm/v3/objects/{kind}/{id}", self.base);
        let query = [("properties", properties.join(","))];
        let response = self.send_get(&url, &query).await?;

        let parsed: ObjectResponse = response
            .json()
            .await
            .map_err(|e| LandingSyncError::lookup(format!("invalid {kind} record {id}: {e}")))?;

        let properties: HashMap<String, String> = parsed
            .properties
            .into_iter()
            .filter_map(|(name, value)| property_text(value).map(|v| (name, v)))
            .collect();

        debug!(properties = properties.len(), "record fetched");
        Ok(CrmRecord {
            id: parsed.id,
            properties,
        })
    }

    #[instrument(skip_all, fields(kind = %kind, id = %id, target = %target_kind))]
    async fn get_associations(
        &self,
        kind: &str,
        id: &str,
        target_kind: &str,
    ) -> Result<Vec<AssociatedObject>> {
        let url = format!(
            "{}/crm/v3/objects/{kind}/{id}/associations/{target_kind}",
            self.base
        );
        let response = self.send_get(&url, &[]).await?;

        let parsed: AssociationsResponse = response.json().await.map_err(|e| {
            LandingSyncError::lookup(format!("invalid associations for {kind} {id}: {e}"))
        })?;

        let associated: Vec<AssociatedObject> = parsed
            .results
            .into_iter()
            .filter_map(|entry| property_text(entry.id))
            .map(|id| AssociatedObject { id })
            .collect();

        debug!(count = associated.len(), "associations fetched");
        Ok(associated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HubSpotClient {
        let base = Url::parse(&server.uri()).unwrap();
        HubSpotClient::new(Secret::new("pat-test"), &base).unwrap()
    }

    #[tokio::test]
    async fn get_record_drops_null_properties() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/42"))
            .and(header("authorization", "Bearer pat-test"))
            .and(query_param(
                "properties",
                "website_status,duda_site_code,dealtype",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "42",
                "properties": {
                    "website_status": "Ready for Published",
                    "duda_site_code": "2d659bec",
                    "dealtype": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = client(&server)
            .get_record(
                "deals",
                "42",
                &["website_status", "duda_site_code", "dealtype"],
            )
            .await
            .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.property("duda_site_code"), Some("2d659bec"));
        assert!(!record.properties.contains_key("dealtype"));
    }

    #[tokio::test]
    async fn missing_record_is_lookup_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_record("contacts", "7", &["city"])
            .await
            .unwrap_err();
        assert!(matches!(err, LandingSyncError::Lookup { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn associations_preserve_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/42/associations/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": "901", "type": "deal_to_contact"},
                    {"id": 902, "type": "deal_to_contact"}
                ]
            })))
            .mount(&server)
            .await;

        let associated = client(&server)
            .get_associations("deals", "42", "contacts")
            .await
            .unwrap();
        assert_eq!(
            associated,
            vec![
                AssociatedObject { id: "901".into() },
                AssociatedObject { id: "902".into() },
            ]
        );
    }

    #[tokio::test]
    async fn server_error_is_lookup_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/42/associations/contacts"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_associations("deals", "42", "contacts")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
