//! CRM lookups for webhook-triggered runs.
//!
//! A deal-change notification only carries an object id, so the webhook flow
//! reads the deal, follows its association to the owning contact, and reads
//! the contact's service profile. [`CrmClient`] is the seam; [`HubSpotClient`]
//! talks to the HubSpot CRM v3 objects API.

mod hubspot;

use std::collections::HashMap;

use async_trait::async_trait;
use landingsync_shared::Result;
use serde::{Deserialize, Serialize};

pub use hubspot::HubSpotClient;

/// A CRM object with the requested properties that carried a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmRecord {
    pub id: String,
    /// Property name to value. Null properties are omitted.
    pub properties: HashMap<String, String>,
}

impl CrmRecord {
    /// The trimmed property value, or `None` when absent or blank.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// One object linked to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedObject {
    pub id: String,
}

/// Read access to CRM records and their associations.
///
/// Missing records and transport failures both surface as
/// [`LandingSyncError::Lookup`](landingsync_shared::LandingSyncError::Lookup).
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Fetch `kind/id` with the named properties.
    async fn get_record(&self, kind: &str, id: &str, properties: &[&str]) -> Result<CrmRecord>;

    /// List objects of `target_kind` associated with `kind/id`, in CRM order.
    async fn get_associations(
        &self,
        kind: &str,
        id: &str,
        target_kind: &str,
    ) -> Result<Vec<AssociatedObject>>;
}
