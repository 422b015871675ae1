//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use landingsync_shared::{LandingSyncError, Result, RunConfig, Secret};

use crate::{CompletionRequest, TextGenerator};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("landingsync/", env!("CARGO_PKG_VERSION"));

/// Generation calls can be slow for long location lists.
const REQUEST_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    n: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`TextGenerator`] backed by `POST {base_url}/chat/completions`.
pub struct OpenAiGenerator {
    client: Client,
    api_key: Secret,
    model: String,
    endpoint: String,
}

impl OpenAiGenerator {
    /// Create a generator for `model` at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: Secret, model: impl Into<String>, base_url: &Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                LandingSyncError::Generation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: format!(
                "{}/chat/completions",
                base_url.as_str().trim_end_matches('/')
            ),
        })
    }

    /// Build from the run's resolved configuration.
    pub fn from_run_config(config: &RunConfig) -> Result<Self> {
        Self::new(
            config.openai_api_key.clone(),
            config.app.openai.model.clone(),
            &config.openai_base_url,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = request.max_tokens))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            n: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| LandingSyncError::Generation(format!("chat completion request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            warn!(%status, "chat completion rejected");
            return Err(LandingSyncError::Generation(format!(
                "chat completion returned HTTP {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            LandingSyncError::Generation(format!("invalid chat completion response: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| {
                LandingSyncError::Generation("chat completion returned no choices".into())
            })?;

        debug!(chars = content.len(), "chat completion received");
        Ok(content.trim().to_string())
    }
}
