//! Language model capability
//!
//! Everything that talks to a model goes through [`LanguageModel`]: the
//! OpenAI-compatible HTTP client, the offline mock, and the transcript
//! recorder that wraps either of them.

pub mod http;
pub mod mock;
pub mod recording;
#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpLanguageModel;
pub use mock::MockLanguageModel;
pub use recording::{transcript_messages, Exchange, RecordingModel};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use utamemo_common::config::ModelProfile;

use crate::services::prompts::Prompt;

/// Which pipeline stage a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTask {
    LyricParsing,
    CardGeneration,
}

impl LlmTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmTask::LyricParsing => "lyric_parsing",
            LlmTask::CardGeneration => "card_generation",
        }
    }
}

/// One system + user prompt exchange with sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub task: LlmTask,
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(task: LlmTask, prompt: Prompt, profile: &ModelProfile) -> Self {
        Self {
            task,
            system: prompt.system,
            user: prompt.user,
            model: profile.model.clone(),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        }
    }
}

/// Language model errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Language model not configured: {0}")]
    NotConfigured(String),

    #[error("Language model rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed completion response: {0}")]
    Parse(String),

    #[error("Language model returned an empty completion")]
    EmptyResponse,
}

impl LlmError {
    /// Missing or rejected credentials. Retrying will not help.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LlmError::NotConfigured(_) | LlmError::Unauthorized(_))
    }

    /// Failures worth retrying under a retry policy
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited | LlmError::Network(_) => true,
            LlmError::Api(status, _) => *status >= 500,
            _ => false,
        }
    }
}

/// Text completion capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier for logs and `/health`
    fn name(&self) -> &'static str;

    /// Send one completion request and return the raw reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}
