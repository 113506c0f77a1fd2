//! Card endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utamemo_common::models::Card;
use uuid::Uuid;

use super::{ensure_owner, visible_card, visible_line, CurrentUser};
use crate::db;
use crate::services::{card_generator::MAX_CARDS_PER_REQUEST, generate_line_cards};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCardsRequest {
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCards {
    pub line_id: Uuid,
    pub cards: Vec<Card>,
    pub count: usize,
}

/// POST /api/lines/:line_id/cards
pub async fn generate_cards(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(line_id): Path<Uuid>,
    Json(request): Json<GenerateCardsRequest>,
) -> ApiResult<(StatusCode, Json<GeneratedCards>)> {
    if !(1..=MAX_CARDS_PER_REQUEST).contains(&request.count) {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_CARDS_PER_REQUEST
        )));
    }

    let (song, line) = visible_line(&state, line_id, &user).await?;
    ensure_owner(&song, &user)?;

    let cards = generate_line_cards(
        &state.db,
        state.model.as_ref(),
        &state.llm.card_generation,
        user.id(),
        &line,
        request.count,
    )
    .await?;

    info!(
        line_id = %line_id,
        requested = request.count,
        created = cards.len(),
        "Cards generated"
    );

    let count = cards.len();
    Ok((StatusCode::CREATED, Json(GeneratedCards { line_id, cards, count })))
}

/// GET /api/cards/:card_id
pub async fn get_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(card_id): Path<Uuid>,
) -> ApiResult<Json<Card>> {
    let (_, card) = visible_card(&state, card_id, &user).await?;
    Ok(Json(card))
}

/// DELETE /api/cards/:card_id
pub async fn delete_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(card_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (song, _) = visible_card(&state, card_id, &user).await?;
    ensure_owner(&song, &user)?;

    if !db::cards::delete_card(&state.db, card_id).await? {
        return Err(ApiError::NotFound(format!("Card {}", card_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Build card routes
pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/lines/:line_id/cards", post(generate_cards))
        .route("/api/cards/:card_id", get(get_card).delete(delete_card))
}
