//! OpenAI-compatible chat completions client

use super::{CompletionRequest, LanguageModel, LlmError};
use crate::utils::{retry_with_backoff, RateLimiter, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use utamemo_common::config::LlmConfig;

const USER_AGENT: &str = concat!("utamemo/", env!("CARGO_PKG_VERSION"));
const ERROR_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Language model reached over HTTP with bearer authentication
pub struct HttpLanguageModel {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpLanguageModel {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured("API key is empty".to_string()));
        }
        let base_url = config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(LlmError::NotConfigured("base_url is empty".to_string()));
        }

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", base_url),
            api_key,
            rate_limiter: RateLimiter::new(config.min_interval_ms),
            retry: RetryPolicy::from(&config.retry),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.rate_limiter.wait().await;

        let body = ChatCompletionBody {
            model: &request.model,
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
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Unauthorized(status.as_u16()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let snippet: String = error_text.chars().take(ERROR_SNIPPET_CHARS).collect();
            return Err(LlmError::Api(status.as_u16(), snippet));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        tracing::debug!(
            task = request.task.as_str(),
            model = %request.model,
            prompt_chars = request.user.chars().count(),
            reply_chars = content.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion received"
        );

        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        retry_with_backoff(
            request.task.as_str(),
            &self.retry,
            LlmError::is_transient,
            move || self.send_once(request),
        )
        .await
    }
}
