//! Core domain types for landingsync runs.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HeadingStyle;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A trimmed, non-empty place name, normally `"Name, Region"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Wrap `raw` after trimming. Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Location {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered, duplicate-free set of page locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSet {
    /// Priority entries first, then generated ones.
    pub locations: Vec<Location>,
    /// How many locations the caller asked for.
    pub requested: usize,
    /// Number of priority entries at the head of `locations`.
    pub priority_count: usize,
}

impl LocationSet {
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// True when the generator could not supply the requested count.
    pub fn is_short(&self) -> bool {
        self.locations.len() < self.requested
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Location names as plain strings, in order.
    pub fn names(&self) -> Vec<String> {
        self.locations.iter().map(|l| l.as_str().to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// PageRow
// ---------------------------------------------------------------------------

/// One dynamic-content row: a landing page for a single location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRow {
    /// URL-safe page slug.
    pub identifier: String,
    /// Page heading.
    pub heading: String,
    /// Paragraph body, generated or templated.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Outcome of one create-rows call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// 2xx: every row in the batch was created.
    Accepted,
    /// 4xx: some or all rows may have been created.
    AmbiguousAccepted,
    /// 5xx or transport failure.
    Failed,
}

/// A batch that did not reach the platform intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    /// Row indices covered by the batch.
    pub range: Range<usize>,
    /// HTTP status, absent for transport failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

/// Bookkeeping for one publish cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Rows sent in any batch, whatever the outcome.
    pub rows_attempted: usize,
    /// Rows in batches answered with 2xx.
    pub rows_succeeded: usize,
    /// Rows in batches answered with 4xx and presumed created.
    pub rows_ambiguous: usize,
    /// Number of create-rows calls issued.
    pub batches_sent: usize,
    pub failed_batches: Vec<FailedBatch>,
    /// Whether the final publish call succeeded.
    pub site_published: bool,
}

impl PublishReport {
    /// Rows that are, or may be, live in the collection.
    pub fn rows_created(&self) -> usize {
        self.rows_succeeded + self.rows_ambiguous
    }
}

// ---------------------------------------------------------------------------
// Run request / result
// ---------------------------------------------------------------------------

/// Input of a page-generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Base city the generated locations surround. Empty for manual runs.
    #[serde(default)]
    pub anchor_location: String,
    pub industry: String,
    pub page_count: usize,
    pub site_id: String,
    pub collection_name: String,
    /// Must-include locations, placed first.
    #[serde(default)]
    pub priority_locations: Vec<String>,
    /// Explicit locations used instead of generation when no anchor is given.
    #[serde(default)]
    pub manual_locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Overrides the configured heading style for this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_style: Option<HeadingStyle>,
}

/// Overall state of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every batch accepted (or ambiguously accepted).
    Success,
    /// Some batches failed.
    Partial,
    /// Nothing was created.
    Failed,
}

/// Structured result reported to the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    pub pages_created: usize,
    pub pages_attempted: usize,
    pub site_id: String,
    /// Location names the rows were built from, in order.
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_batches: Vec<FailedBatch>,
    pub site_published: bool,
    /// When the publish phase finished.
    pub finished_at: DateTime<Utc>,
}
