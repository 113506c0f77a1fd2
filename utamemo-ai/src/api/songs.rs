//! Song endpoints: import, browse, delete

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;
use utamemo_common::models::{Card, Conversation, Line, Song};
use uuid::Uuid;

use super::{ensure_owner, visible_song, CurrentUser};
use crate::db;
use crate::services::{ImportReport, ImportRequest, SongImporter};
use crate::{ApiError, ApiResult, AppState};

/// Song with its lines in order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDetail {
    #[serde(flatten)]
    pub song: Song,
    pub lines: Vec<Line>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongList {
    pub songs: Vec<Song>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardList {
    pub cards: Vec<Card>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

/// POST /api/songs/import
pub async fn import_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportReport>)> {
    info!(
        title = %request.song.title,
        lines = request.lines.len(),
        parse_with_ai = request.options.parse_with_ai,
        generate_cards = request.options.generate_cards,
        "Import requested"
    );

    let report = SongImporter::new(&state.db, state.model.as_ref(), &state.llm)
        .import(user.id(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/songs
pub async fn list_songs(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<SongList>> {
    let songs = db::songs::list_visible_songs(&state.db, user.id()).await?;
    let count = songs.len();
    Ok(Json(SongList { songs, count }))
}

/// GET /api/songs/:song_id
pub async fn get_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(song_id): Path<Uuid>,
) -> ApiResult<Json<SongDetail>> {
    let song = visible_song(&state, song_id, &user).await?;
    let lines = db::lines::list_lines(&state.db, song.id).await?;
    Ok(Json(SongDetail { song, lines }))
}

/// DELETE /api/songs/:song_id
///
/// Lines, cards and progress go with the song; conversations stay, detached.
pub async fn delete_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(song_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let song = visible_song(&state, song_id, &user).await?;
    ensure_owner(&song, &user)?;

    if !db::songs::delete_song(&state.db, song.id).await? {
        return Err(ApiError::NotFound(format!("Song {}", song_id)));
    }

    info!(song_id = %song_id, title = %song.title, "Song deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/songs/:song_id/cards
pub async fn list_song_cards(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(song_id): Path<Uuid>,
) -> ApiResult<Json<CardList>> {
    let song = visible_song(&state, song_id, &user).await?;
    let cards = db::cards::list_cards_for_song(&state.db, song.id).await?;
    let count = cards.len();
    Ok(Json(CardList { cards, count }))
}

/// GET /api/songs/:song_id/conversations
pub async fn list_song_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(song_id): Path<Uuid>,
) -> ApiResult<Json<ConversationList>> {
    let song = visible_song(&state, song_id, &user).await?;
    let conversations = db::conversations::list_conversations_for_song(&state.db, song.id)
        .await?
        .into_iter()
        .filter(|c| c.user_id.is_none() || c.user_id.as_deref() == user.id())
        .collect();
    Ok(Json(ConversationList { conversations }))
}

/// Build song routes
pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/api/songs", get(list_songs))
        .route("/api/songs/import", post(import_song))
        .route("/api/songs/:song_id", get(get_song).delete(delete_song))
        .route("/api/songs/:song_id/cards", get(list_song_cards))
        .route("/api/songs/:song_id/conversations", get(list_song_conversations))
}
