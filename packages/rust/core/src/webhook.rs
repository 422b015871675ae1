//! CRM webhook handling.
//!
//! A deal moving to "Ready for Published" triggers a page run for the deal's
//! contact. The contact carries the service profile (industry, company, city
//! and state, or up to 100 manually entered locations); the deal carries the
//! target site and the package that decides how many pages to build.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use landingsync_crm::CrmClient;
use landingsync_shared::{HeadingStyle, LandingSyncError, PageRequest, PageRunResult, Result};

use crate::pipeline::{PagePipeline, ProgressReporter};

/// Deal status that triggers page creation.
pub const READY_STATUS: &str = "Ready for Published";

/// Highest `location_N` contact property.
const MAX_MANUAL_LOCATIONS: usize = 100;

/// Collection webhook runs write to.
const WEBHOOK_COLLECTION: &str = "Location";

const DEAL_PROPERTIES: [&str; 3] = ["website_status", "duda_site_code", "dealtype"];

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// One event of a CRM webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(default, deserialize_with = "flexible_id")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default, alias = "contact_id", deserialize_with = "flexible_id")]
    pub contact_id: Option<String>,
    #[serde(default, alias = "deal_id", deserialize_with = "flexible_id")]
    pub deal_id: Option<String>,
}

/// Ids arrive as numbers or strings; blanks count as absent.
fn flexible_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Extract the event to act on: the first of an array, or a single object.
pub fn parse_webhook_body(body: &str) -> Result<WebhookEvent> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| LandingSyncError::validation(format!("webhook body is not JSON: {e}")))?;

    let event = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| LandingSyncError::validation("webhook payload contains no events"))?,
        object @ Value::Object(_) => object,
        _ => {
            return Err(LandingSyncError::validation(
                "webhook payload must be an event or an array of events",
            ));
        }
    };

    serde_json::from_value(event)
        .map_err(|e| LandingSyncError::validation(format!("invalid webhook event: {e}")))
}

/// Contact (and optionally deal) a webhook event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub contact_id: String,
    pub deal_id: Option<String>,
}

/// Result of processing one webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The deal is not ready; nothing was generated.
    Skipped {
        deal_id: String,
        website_status: Option<String>,
    },
    /// Pages were generated and published.
    Completed(PageRunResult),
}

/// Number of pages the deal's package includes.
pub fn pages_for_deal_type(deal_type: Option<&str>, default_pages: usize) -> usize {
    let Some(deal_type) = deal_type else {
        return default_pages;
    };
    let lower = deal_type.to_lowercase();
    if lower.contains("power pages") {
        50
    } else if lower.contains("10 landing pages") || lower.contains("starter plus $59") {
        10
    } else {
        default_pages
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Resolves webhook events through the CRM and runs the page pipeline.
pub struct WebhookProcessor<'a> {
    crm: &'a dyn CrmClient,
    pipeline: &'a PagePipeline<'a>,
    default_pages: usize,
}

impl<'a> WebhookProcessor<'a> {
    pub fn new(crm: &'a dyn CrmClient, pipeline: &'a PagePipeline<'a>, default_pages: usize) -> Self {
        Self {
            crm,
            pipeline,
            default_pages,
        }
    }

    /// Work out which contact (and deal) an event is about.
    ///
    /// An explicit contact id wins. For deal subscriptions the deal's first
    /// associated contact is used; otherwise `objectId` is the contact.
    pub async fn resolve_target(&self, event: &WebhookEvent) -> Result<WebhookTarget> {
        if let Some(contact_id) = &event.contact_id {
            return Ok(WebhookTarget {
                contact_id: contact_id.clone(),
                deal_id: event.deal_id.clone(),
            });
        }

        let Some(object_id) = &event.object_id else {
            return Err(LandingSyncError::validation("no objectId found in webhook"));
        };

        let is_deal_event = event
            .subscription_type
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains("deal"));

        if is_deal_event {
            let contacts = self
                .crm
                .get_associations("deals", object_id, "contacts")
                .await?;
            let contact = contacts.into_iter().next().ok_or_else(|| {
                LandingSyncError::lookup(format!("no contacts associated with deal {object_id}"))
            })?;
            info!(deal_id = %object_id, contact_id = %contact.id, "resolved deal contact");
            Ok(WebhookTarget {
                contact_id: contact.id,
                deal_id: Some(object_id.clone()),
            })
        } else {
            Ok(WebhookTarget {
                contact_id: object_id.clone(),
                deal_id: event.deal_id.clone(),
            })
        }
    }

    /// Generate pages for a contact whose deal is ready for publishing.
    #[instrument(skip_all, fields(contact_id = %contact_id))]
    pub async fn process_contact_update(
        &self,
        contact_id: &str,
        deal_id: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<WebhookOutcome> {
        let deal_id = match deal_id {
            Some(id) => id.to_string(),
            None => {
                let deals = self
                    .crm
                    .get_associations("contacts", contact_id, "deals")
                    .await?;
                deals
                    .into_iter()
                    .next()
                    .map(|deal| deal.id)
                    .ok_or_else(|| {
                        LandingSyncError::lookup(format!(
                            "no deals associated with contact {contact_id}"
                        ))
                    })?
            }
        };

        let deal = self.crm.get_record("deals", &deal_id, &DEAL_PROPERTIES).await?;
        let website_status = deal.property("website_status");
        info!(
            %deal_id,
            website_status = website_status.unwrap_or(""),
            deal_type = deal.property("dealtype").unwrap_or(""),
            "deal fetched"
        );

        if website_status != Some(READY_STATUS) {
            info!(%deal_id, "deal not ready for publishing, skipping");
            return Ok(WebhookOutcome::Skipped {
                deal_id,
                website_status: website_status.map(str::to_string),
            });
        }

        let site_id = deal
            .property("duda_site_code")
            .ok_or_else(|| {
                LandingSyncError::validation(format!("deal {deal_id} has no site code"))
            })?
            .to_string();
        let page_count = pages_for_deal_type(deal.property("dealtype"), self.default_pages);

        let contact_properties = contact_properties();
        let property_names: Vec<&str> = contact_properties.iter().map(String::as_str).collect();
        let contact = self
            .crm
            .get_record("contacts", contact_id, &property_names)
            .await?;

        let industry = contact
            .property("industry_1")
            .ok_or_else(|| {
                LandingSyncError::validation(format!("contact {contact_id} has no industry"))
            })?
            .to_string();

        let anchor = match (contact.property("city"), contact.property("state")) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            _ => String::new(),
        };

        let manual_locations: Vec<String> = if anchor.is_empty() {
            (1..=page_count.min(MAX_MANUAL_LOCATIONS))
                .filter_map(|i| contact.property(&format!("location_{i}")))
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        if anchor.is_empty() && manual_locations.is_empty() {
            warn!("contact has neither city/state nor manual locations");
            return Err(LandingSyncError::validation(format!(
                "contact {contact_id} has no city/state and no manual locations"
            )));
        }

        info!(
            %site_id,
            %industry,
            page_count,
            anchor = %anchor,
            manual = manual_locations.len(),
            "starting webhook page run"
        );

        let request = PageRequest {
            anchor_location: anchor,
            industry,
            page_count,
            site_id,
            collection_name: WEBHOOK_COLLECTION.to_string(),
            priority_locations: Vec::new(),
            manual_locations,
            company_name: contact.property("company_name").map(str::to_string),
            heading_style: Some(HeadingStyle::Best),
        };

        let result = self.pipeline.run(&request, progress).await?;
        Ok(WebhookOutcome::Completed(result))
    }
}

fn contact_properties() -> Vec<String> {
    ["industry_1", "company_name", "city", "state"]
        .into_iter()
        .map(str::to_string)
        .chain((1..=MAX_MANUAL_LOCATIONS).map(|i| format!("location_{i}")))
        .collect()
}
