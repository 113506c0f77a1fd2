//! Transcript capture around another model

use super::{CompletionRequest, LanguageModel, LlmError, LlmTask};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use utamemo_common::models::{Message, MessageRole};
use uuid::Uuid;

/// One request and what came back
#[derive(Debug, Clone)]
pub struct Exchange {
    pub task: LlmTask,
    pub system: String,
    pub user: String,
    pub reply: Result<String, LlmError>,
}

/// Forwards to `inner` and keeps every exchange in call order
pub struct RecordingModel<'a> {
    inner: &'a dyn LanguageModel,
    exchanges: Mutex<Vec<Exchange>>,
}

impl<'a> RecordingModel<'a> {
    pub fn new(inner: &'a dyn LanguageModel) -> Self {
        Self {
            inner,
            exchanges: Mutex::new(Vec::new()),
        }
    }

    pub fn into_exchanges(self) -> Vec<Exchange> {
        self.exchanges.into_inner()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel<'_> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let reply = self.inner.complete(request).await;
        self.exchanges.lock().await.push(Exchange {
            task: request.task,
            system: request.system.clone(),
            user: request.user.clone(),
            reply: reply.clone(),
        });
        reply
    }
}

/// Flatten exchanges into conversation messages numbered from 1.
///
/// Each exchange contributes its system prompt, user prompt, and either the
/// assistant reply or a system note describing the failure.
pub fn transcript_messages(conversation_id: Uuid, exchanges: &[Exchange]) -> Vec<Message> {
    let created_at = Utc::now();
    let mut messages = Vec::with_capacity(exchanges.len() * 3);

    for exchange in exchanges {
        let reply = match &exchange.reply {
            Ok(text) => (MessageRole::Assistant, text.clone()),
            Err(e) => (MessageRole::System, format!("Request failed: {}", e)),
        };

        for (role, content) in [
            (MessageRole::System, exchange.system.clone()),
            (MessageRole::User, exchange.user.clone()),
            reply,
        ] {
            messages.push(Message {
                id: Uuid::new_v4(),
                conversation_id,
                seq: messages.len() as u32 + 1,
                role,
                content,
                created_at,
            });
        }
    }

    messages
}
