//! Text-generation collaborator.
//!
//! The pipeline treats the language model as a black box: prompt in, free
//! text out. [`TextGenerator`] is the seam the core depends on, and
//! [`OpenAiGenerator`] is the production implementation over an
//! OpenAI-compatible chat-completions endpoint.

mod openai;

use async_trait::async_trait;
use landingsync_shared::Result;

pub use openai::OpenAiGenerator;

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System prompt framing the assistant's role.
    pub system: String,
    /// User prompt carrying the task.
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Produces free text for a prompt.
///
/// The returned text carries no structural guarantee; callers parse and
/// validate it themselves. Failures are
/// [`LandingSyncError::Generation`](landingsync_shared::LandingSyncError::Generation).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
