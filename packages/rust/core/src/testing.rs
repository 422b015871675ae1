//! In-memory collaborators for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use landingsync_crm::{AssociatedObject, CrmClient, CrmRecord};
use landingsync_llm::{CompletionRequest, TextGenerator};
use landingsync_publisher::{PlatformResponse, PublishingPlatform};
use landingsync_shared::{LandingSyncError, PageRow, Result};

/// Replays canned responses in order, then fails every further call.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<&str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LandingSyncError::Generation("no scripted response".into())))
    }
}

/// Records every batch; answers create calls from a status queue (200 once exhausted).
#[derive(Default)]
pub struct RecordingPlatform {
    statuses: Mutex<VecDeque<u16>>,
    batches: Mutex<Vec<Vec<PageRow>>>,
    published: Mutex<usize>,
}

impl RecordingPlatform {
    pub fn with_statuses(statuses: Vec<u16>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn sent_rows(&self) -> Vec<Vec<PageRow>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn publish_calls(&self) -> usize {
        *self.published.lock().unwrap()
    }
}

#[async_trait]
impl PublishingPlatform for RecordingPlatform {
    async fn create_rows(&self, _: &str, _: &str, rows: &[PageRow]) -> Result<PlatformResponse> {
        self.batches.lock().unwrap().push(rows.to_vec());
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        Ok(PlatformResponse::new(status, format!("status {status}")))
    }

    async fn publish_site(&self, _: &str) -> Result<PlatformResponse> {
        *self.published.lock().unwrap() += 1;
        Ok(PlatformResponse::new(200, ""))
    }
}

/// Fixed records and associations keyed by `(kind, id)`.
#[derive(Default)]
pub struct FakeCrm {
    records: HashMap<(String, String), HashMap<String, String>>,
    associations: HashMap<(String, String, String), Vec<String>>,
    lookups: Mutex<Vec<String>>,
}

impl FakeCrm {
    pub fn record(mut self, kind: &str, id: &str, properties: &[(&str, &str)]) -> Self {
        self.records.insert(
            (kind.to_string(), id.to_string()),
            properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn associate(mut self, kind: &str, id: &str, target_kind: &str, targets: &[&str]) -> Self {
        self.associations.insert(
            (kind.to_string(), id.to_string(), target_kind.to_string()),
            targets.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// `kind/id` of every record fetched, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn get_record(&self, kind: &str, id: &str, properties: &[&str]) -> Result<CrmRecord> {
        self.lookups.lock().unwrap().push(format!("{kind}/{id}"));
        let stored = self
            .records
            .get(&(kind.to_string(), id.to_string()))
            .ok_or_else(|| LandingSyncError::lookup(format!("{kind} {id} not found")))?;

        Ok(CrmRecord {
            id: id.to_string(),
            properties: stored
                .iter()
                .filter(|(name, _)| properties.contains(&name.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    async fn get_associations(
        &self,
        kind: &str,
        id: &str,
        target_kind: &str,
    ) -> Result<Vec<AssociatedObject>> {
        Ok(self
            .associations
            .get(&(kind.to_string(), id.to_string(), target_kind.to_string()))
            .map(|ids| ids.iter().map(|id| AssociatedObject { id: id.clone() }).collect())
            .unwrap_or_default())
    }
}
