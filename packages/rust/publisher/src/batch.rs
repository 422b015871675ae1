//! Batched row publishing with per-batch bookkeeping.
//!
//! Rows are sent in consecutive slices of at most `batch_size`. One failing
//! batch never stops the cycle: its range is recorded and the next batch is
//! still sent. The site is published once at the end whatever happened.

use std::time::Duration;

use tracing::{error, info, instrument, warn};

use landingsync_shared::{
    BatchOutcome, ClientErrorPolicy, FailedBatch, LandingSyncError, PageRow, PublishReport,
    PublishingConfig,
};

use crate::client::{PlatformResponse, PublishingPlatform};

/// Response bodies are cut to this many characters in logs and reports.
const BODY_PREVIEW_CHARS: usize = 300;

/// Batch size, pacing and 4xx handling for one publish cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Rows per create call. Zero is treated as one.
    pub batch_size: usize,
    /// Pause between successive create calls.
    pub delay: Duration,
    pub client_error_policy: ClientErrorPolicy,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from_config(&PublishingConfig::default())
    }
}

impl BatchPolicy {
    pub fn from_config(config: &PublishingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            delay: Duration::from_millis(config.batch_delay_ms),
            client_error_policy: config.client_error_policy,
        }
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Map a create-rows status to its batch outcome.
pub fn classify(status: u16, policy: ClientErrorPolicy) -> BatchOutcome {
    match status {
        200..=299 => BatchOutcome::Accepted,
        400..=499 => match policy {
            ClientErrorPolicy::AssumeCreated => BatchOutcome::AmbiguousAccepted,
            ClientErrorPolicy::TreatAsFailure => BatchOutcome::Failed,
        },
        _ => BatchOutcome::Failed,
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Sends rows to a [`PublishingPlatform`] and publishes the site.
pub struct BatchPublisher<'a> {
    platform: &'a dyn PublishingPlatform,
    policy: BatchPolicy,
}

impl<'a> BatchPublisher<'a> {
    pub fn new(platform: &'a dyn PublishingPlatform, policy: BatchPolicy) -> Self {
        Self { platform, policy }
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Publish `rows` and report what happened. Never fails.
    pub async fn publish(&self, site_id: &str, collection: &str, rows: &[PageRow]) -> PublishReport {
        self.publish_observed(site_id, collection, rows, |_, _| {})
            .await
    }

    /// Like [`publish`](Self::publish), calling `on_batch(index, outcome)` after each batch.
    #[instrument(skip_all, fields(site_id = %site_id, collection = %collection, rows = rows.len()))]
    pub async fn publish_observed<F>(
        &self,
        site_id: &str,
        collection: &str,
        rows: &[PageRow],
        on_batch: F,
    ) -> PublishReport
    where
        F: Fn(usize, BatchOutcome) + Send + Sync,
    {
        let batch_size = self.policy.effective_batch_size();
        let total_batches = rows.len().div_ceil(batch_size);
        let mut report = PublishReport::default();

        info!(batch_size, batches = total_batches, "publishing rows");

        for (index, chunk) in rows.chunks(batch_size).enumerate() {
            if index > 0 && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }

            let start = index * batch_size;
            let range = start..start + chunk.len();
            report.batches_sent += 1;
            report.rows_attempted += chunk.len();

            let outcome = match self.platform.create_rows(site_id, collection, chunk).await {
                Ok(response) => self.record_response(&mut report, index, range, &response),
                Err(e) => {
                    error!(batch = index, error = %e, "batch transport failure");
                    report.failed_batches.push(FailedBatch {
                        range,
                        status: None,
                        error: e.to_string(),
                    });
                    BatchOutcome::Failed
                }
            };
            on_batch(index, outcome);
        }

        report.site_published = match self.platform.publish_site(site_id).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                warn!(
                    status = response.status,
                    body = %preview(&response.body),
                    "site publish rejected"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "site publish failed");
                false
            }
        };

        info!(
            attempted = report.rows_attempted,
            succeeded = report.rows_succeeded,
            ambiguous = report.rows_ambiguous,
            failed_batches = report.failed_batches.len(),
            published = report.site_published,
            "publish cycle finished"
        );

        report
    }

    fn record_response(
        &self,
        report: &mut PublishReport,
        index: usize,
        range: std::ops::Range<usize>,
        response: &PlatformResponse,
    ) -> BatchOutcome {
        let outcome = classify(response.status, self.policy.client_error_policy);
        let rows = range.len();

        match outcome {
            BatchOutcome::Accepted => {
                report.rows_succeeded += rows;
                info!(batch = index, rows, status = response.status, "batch accepted");
            }
            BatchOutcome::AmbiguousAccepted => {
                report.rows_ambiguous += rows;
                warn!(
                    batch = index,
                    rows,
                    status = response.status,
                    body = %preview(&response.body),
                    "batch rejected with client error, rows may have been created"
                );
            }
            BatchOutcome::Failed => {
                let message = preview(&response.body);
                if (400..500).contains(&response.status) {
                    warn!(batch = index, status = response.status, body = %message, "batch rejected");
                } else {
                    error!(batch = index, status = response.status, body = %message, "batch failed");
                }
                report.failed_batches.push(FailedBatch {
                    range,
                    status: Some(response.status),
                    error: LandingSyncError::PublishBatch {
                        status: response.status,
                        message,
                    }
                    .to_string(),
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use landingsync_shared::Result;

    use super::*;

    /// Answers create calls from a queue of statuses (200 once exhausted).
    #[derive(Default)]
    struct QueuedPlatform {
        statuses: Mutex<Vec<Result<u16>>>,
        publish_status: Option<u16>,
        calls: Mutex<Vec<usize>>,
        published: Mutex<usize>,
    }

    impl QueuedPlatform {
        fn with(statuses: Vec<Result<u16>>, publish_status: Option<u16>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().rev().collect()),
                publish_status,
                ..Self::default()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PublishingPlatform for QueuedPlatform {
        async fn create_rows(&self, _: &str, _: &str, rows: &[PageRow]) -> Result<PlatformResponse> {
            self.calls.lock().unwrap().push(rows.len());
            let status = self.statuses.lock().unwrap().pop().unwrap_or(Ok(200))?;
            Ok(PlatformResponse::new(status, format!("status {status}")))
        }

        async fn publish_site(&self, _: &str) -> Result<PlatformResponse> {
            *self.published.lock().unwrap() += 1;
            match self.publish_status {
                Some(status) => Ok(PlatformResponse::new(status, "")),
                None => Err(LandingSyncError::Network("connection reset".into())),
            }
        }
    }

    fn rows(n: usize) -> Vec<PageRow> {
        (0..n)
            .map(|i| PageRow {
                identifier: format!("town-{i}"),
                heading: format!("Plumber in Town {i}"),
                body: "Body.".into(),
            })
            .collect()
    }

    fn policy(batch_size: usize, client_error_policy: ClientErrorPolicy) -> BatchPolicy {
        BatchPolicy {
            batch_size,
            delay: Duration::ZERO,
            client_error_policy,
        }
    }

    #[test]
    fn classify_statuses() {
        let assume = ClientErrorPolicy::AssumeCreated;
        assert_eq!(classify(201, assume), BatchOutcome::Accepted);
        assert_eq!(classify(422, assume), BatchOutcome::AmbiguousAccepted);
        assert_eq!(
            classify(422, ClientErrorPolicy::TreatAsFailure),
            BatchOutcome::Failed
        );
        assert_eq!(classify(503, assume), BatchOutcome::Failed);
    }

    #[tokio::test]
    async fn failed_middle_batch_does_not_stop_the_cycle() {
        let platform = QueuedPlatform::with(vec![Ok(200), Ok(500), Ok(200)], Some(200));
        let publisher = BatchPublisher::new(&platform, policy(50, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &rows(120)).await;

        assert_eq!(platform.batch_sizes(), vec![50, 50, 20]);
        assert_eq!(report.rows_attempted, 120);
        assert_eq!(report.rows_succeeded, 70);
        assert_eq!(report.batches_sent, 3);
        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].range, 50..100);
        assert_eq!(report.failed_batches[0].status, Some(500));
        assert!(report.site_published);
    }

    #[tokio::test]
    async fn client_error_counts_as_ambiguous_by_default() {
        let platform = QueuedPlatform::with(vec![Ok(400)], Some(200));
        let publisher = BatchPublisher::new(&platform, policy(10, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &rows(4)).await;

        assert_eq!(report.rows_ambiguous, 4);
        assert_eq!(report.rows_succeeded, 0);
        assert_eq!(report.rows_created(), 4);
        assert!(report.failed_batches.is_empty());
    }

    #[tokio::test]
    async fn client_error_can_be_treated_as_failure() {
        let platform = QueuedPlatform::with(vec![Ok(409)], Some(200));
        let publisher =
            BatchPublisher::new(&platform, policy(10, ClientErrorPolicy::TreatAsFailure));

        let report = publisher.publish("site", "Location", &rows(4)).await;

        assert_eq!(report.rows_ambiguous, 0);
        assert_eq!(report.rows_created(), 0);
        assert_eq!(report.failed_batches[0].status, Some(409));
    }

    #[tokio::test]
    async fn transport_error_is_recorded_without_status() {
        let platform = QueuedPlatform::with(
            vec![Err(LandingSyncError::Network("timed out".into())), Ok(200)],
            Some(200),
        );
        let publisher = BatchPublisher::new(&platform, policy(2, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &rows(3)).await;

        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].range, 0..2);
        assert_eq!(report.failed_batches[0].status, None);
        assert_eq!(report.rows_succeeded, 1);
    }

    #[tokio::test]
    async fn publish_failure_only_clears_flag() {
        let platform = QueuedPlatform::with(vec![], None);
        let publisher = BatchPublisher::new(&platform, policy(50, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &rows(3)).await;

        assert_eq!(report.rows_succeeded, 3);
        assert!(!report.site_published);
    }

    #[tokio::test]
    async fn empty_rows_still_publish() {
        let platform = QueuedPlatform::with(vec![], Some(200));
        let publisher = BatchPublisher::new(&platform, policy(50, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &[]).await;

        assert!(platform.batch_sizes().is_empty());
        assert_eq!(report.batches_sent, 0);
        assert_eq!(*platform.published.lock().unwrap(), 1);
        assert!(report.site_published);
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let platform = QueuedPlatform::with(vec![], Some(200));
        let publisher = BatchPublisher::new(&platform, policy(0, ClientErrorPolicy::AssumeCreated));

        let report = publisher.publish("site", "Location", &rows(3)).await;

        assert_eq!(platform.batch_sizes(), vec![1, 1, 1]);
        assert_eq!(report.batches_sent, 3);
    }

    #[tokio::test]
    async fn observer_sees_every_batch() {
        let platform = QueuedPlatform::with(vec![Ok(200), Ok(502)], Some(200));
        let publisher = BatchPublisher::new(&platform, policy(2, ClientErrorPolicy::AssumeCreated));
        let seen = Mutex::new(Vec::new());

        publisher
            .publish_observed("site", "Location", &rows(4), |index, outcome| {
                seen.lock().unwrap().push((index, outcome));
            })
            .await;

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![(0, BatchOutcome::Accepted), (1, BatchOutcome::Failed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delay_only_between_batches() {
        let platform = QueuedPlatform::with(vec![], Some(200));
        let publisher = BatchPublisher::new(
            &platform,
            BatchPolicy {
                batch_size: 1,
                delay: Duration::from_millis(40),
                client_error_policy: ClientErrorPolicy::AssumeCreated,
            },
        );

        let started = tokio::time::Instant::now();
        publisher.publish("site", "Location", &rows(3)).await;
        assert_eq!(started.elapsed(), Duration::from_millis(80));

        let started = tokio::time::Instant::now();
        publisher.publish("site", "Location", &rows(1)).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
