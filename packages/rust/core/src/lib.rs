//! Core domain logic for landingsync.
//!
//! Turns a base location into a deduplicated set of nearby places, writes a
//! page row for each and publishes them in batches. Collaborators (text
//! generator, CRM, publishing platform) come in as trait objects, so every
//! stage runs without the network in tests.

pub mod content;
pub mod locations;
pub mod normalize;
pub mod pipeline;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use content::{ContentOptions, ContentRowBuilder, fallback_content, slugify, validate_content};
pub use locations::LocationSetBuilder;
pub use normalize::{dedup_key, normalize};
pub use pipeline::{
    MAX_PAGE_COUNT, PagePipeline, PipelineSettings, ProgressReporter, SilentProgress,
    validate_request,
};
pub use webhook::{
    WebhookEvent, WebhookOutcome, WebhookProcessor, WebhookTarget, pages_for_deal_type,
    parse_webhook_body,
};
