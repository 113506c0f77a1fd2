//! Conversation transcripts of model exchanges

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utamemo_common::models::{Conversation, Message};
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// GET /api/conversations/:conversation_id
pub async fn get_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<ConversationDetail>> {
    let conversation = db::conversations::get_conversation(&state.db, conversation_id)
        .await?
        .filter(|c| c.user_id.is_none() || c.user_id.as_deref() == user.id())
        .ok_or_else(|| ApiError::NotFound(format!("Conversation {}", conversation_id)))?;

    let messages = db::conversations::list_messages(&state.db, conversation.id).await?;
    Ok(Json(ConversationDetail { conversation, messages }))
}

pub fn conversation_routes() -> Router<AppState> {
    Router::new().route("/api/conversations/:conversation_id", get(get_conversation))
}
