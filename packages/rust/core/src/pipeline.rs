//! End-to-end page run: request → locations → rows → batches → result.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use landingsync_llm::TextGenerator;
use landingsync_publisher::{BatchPolicy, BatchPublisher, PublishingPlatform};
use landingsync_shared::{
    AppConfig, BatchOutcome, LandingSyncError, Location, LocationSet, PageRequest, PageRunResult,
    PublishReport, Result, RunId, RunStatus,
};

use crate::content::{ContentOptions, ContentRowBuilder};
use crate::locations::{LocationSetBuilder, dedupe_priority};
use crate::normalize::dedup_key;

/// Largest page count a single run accepts.
pub const MAX_PAGE_COUNT: usize = 100;

/// Settings shared by every run of a pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub content: ContentOptions,
    pub batch: BatchPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            content: ContentOptions::from_config(config),
            batch: BatchPolicy::from_config(&config.publishing),
        }
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page row is built.
    fn row_built(&self, heading: &str, current: usize, total: usize);
    /// Called after each create-rows batch, `index` counting from 1.
    fn batch_sent(&self, index: usize, total: usize, accepted: bool);
    /// Called when the run completes.
    fn done(&self, result: &PageRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_built(&self, _heading: &str, _current: usize, _total: usize) {}
    fn batch_sent(&self, _index: usize, _total: usize, _accepted: bool) {}
    fn done(&self, _result: &PageRunResult) {}
}

/// Drives one page-generation run against the given collaborators.
pub struct PagePipeline<'a> {
    generator: &'a dyn TextGenerator,
    platform: &'a dyn PublishingPlatform,
    settings: PipelineSettings,
}

impl<'a> PagePipeline<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        platform: &'a dyn PublishingPlatform,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            platform,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the full pipeline.
    ///
    /// 1. Validate the request
    /// 2. Build the location set (generated around the anchor, or manual)
    /// 3. Build one row per location
    /// 4. Publish rows in batches, then publish the site
    ///
    /// Batch failures are reported in the result, not as an error. Errors are
    /// validation failures and a failed location generation.
    #[instrument(skip_all, fields(site_id = %request.site_id, industry = %request.industry, pages = request.page_count))]
    pub async fn run(
        &self,
        request: &PageRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<PageRunResult> {
        validate_request(request)?;

        let start = Instant::now();
        let run_id = RunId::new();
        info!(%run_id, "starting page run");

        // --- Phase 1: Locations ---
        let anchor = request.anchor_location.trim();
        let set = if anchor.is_empty() {
            progress.phase("Preparing locations");
            manual_location_set(
                &request.priority_locations,
                &request.manual_locations,
                request.page_count,
            )
        } else {
            progress.phase("Generating locations");
            LocationSetBuilder::new(self.generator)
                .build(
                    anchor,
                    request.page_count,
                    &request.priority_locations,
                    &request.industry,
                )
                .await?
        };

        if set.is_empty() {
            warn!("no locations available, nothing to publish");
        }

        // --- Phase 2: Content ---
        progress.phase("Writing page content");
        let mut content = self.settings.content.clone();
        if let Some(style) = request.heading_style {
            content.heading_style = style;
        }
        let company = request
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let rows = ContentRowBuilder::new(self.generator, content)
            .build_rows(&request.industry, &set.locations, company, progress)
            .await;

        // --- Phase 3: Publish ---
        progress.phase("Publishing pages");
        let batch_size = self.settings.batch.batch_size.max(1);
        let total_batches = rows.len().div_ceil(batch_size);
        let report = BatchPublisher::new(self.platform, self.settings.batch.clone())
            .publish_observed(
                &request.site_id,
                &request.collection_name,
                &rows,
                |index, outcome| {
                    progress.batch_sent(index + 1, total_batches, outcome != BatchOutcome::Failed)
                },
            )
            .await;

        let result = assemble_result(run_id, request, &set, report);
        info!(
            run_id = %result.run_id,
            status = ?result.status,
            created = result.pages_created,
            attempted = result.pages_attempted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page run finished"
        );
        progress.done(&result);

        Ok(result)
    }
}

/// Reject requests that cannot produce any page.
pub fn validate_request(request: &PageRequest) -> Result<()> {
    if request.site_id.trim().is_empty() {
        return Err(LandingSyncError::validation("site id is required"));
    }
    if request.industry.trim().is_empty() {
        return Err(LandingSyncError::validation("industry is required"));
    }
    if request.collection_name.trim().is_empty() {
        return Err(LandingSyncError::validation("collection name is required"));
    }
    if request.page_count == 0 {
        return Err(LandingSyncError::validation("page count must be at least 1"));
    }
    if request.page_count > MAX_PAGE_COUNT {
        return Err(LandingSyncError::validation(format!(
            "page count {} exceeds the maximum of {MAX_PAGE_COUNT}",
            request.page_count
        )));
    }
    let has_listed = request
        .manual_locations
        .iter()
        .chain(&request.priority_locations)
        .any(|l| !l.trim().is_empty());
    if request.anchor_location.trim().is_empty() && !has_listed {
        return Err(LandingSyncError::validation(
            "either a base location, priority locations or manual locations are required",
        ));
    }
    Ok(())
}

/// Caller-supplied locations without generation: normalized priority entries
/// first, then the trimmed manual list, deduplicated, at most `count`.
fn manual_location_set(priority: &[String], manual: &[String], count: usize) -> LocationSet {
    let mut locations = dedupe_priority(priority);
    if locations.len() > count {
        warn!(
            priority = locations.len(),
            count, "priority locations exceed page count, truncating"
        );
    }
    let priority_count = locations.len().min(count);

    let mut seen: HashSet<String> = locations
        .iter()
        .map(|loc| dedup_key(loc.as_str()))
        .collect();
    locations.extend(
        manual
            .iter()
            .filter_map(Location::new)
            .filter(|loc| seen.insert(dedup_key(loc.as_str()))),
    );
    locations.truncate(count);

    LocationSet {
        locations,
        requested: count,
        priority_count,
    }
}

fn assemble_result(
    run_id: RunId,
    request: &PageRequest,
    set: &LocationSet,
    report: PublishReport,
) -> PageRunResult {
    let pages_created = report.rows_created();
    let status = if pages_created == 0 {
        RunStatus::Failed
    } else if report.failed_batches.is_empty() {
        RunStatus::Success
    } else {
        RunStatus::Partial
    };

    PageRunResult {
        run_id,
        status,
        pages_created,
        pages_attempted: report.rows_attempted,
        site_id: request.site_id.clone(),
        locations: set.names(),
        failed_batches: report.failed_batches,
        site_published: report.site_published,
        finished_at: Utc::now(),
    }
}
