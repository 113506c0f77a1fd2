//! Deterministic model for unit tests

use super::{CompletionRequest, LanguageModel, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<String, LlmError>>>),
    Responder(Responder),
}

/// Replies from a queue, or computes each reply from the request
pub struct ScriptedModel {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(replies.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().await.push(request.clone());
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse)),
            Script::Responder(responder) => responder(request),
        }
    }
}
