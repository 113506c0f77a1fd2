//! Learning progress and study session endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utamemo_common::learning::{
    CardProgress, LearningStatus, LearningTracker, ProgressStore, SessionSummary, StudyItem,
    StudySession,
};
use utamemo_common::models::Card;
use uuid::Uuid;

use super::{visible_card, visible_song, CurrentUser};
use crate::db;
use crate::db::progress::SqliteProgressStore;
use crate::{ApiResult, AppState};

fn tracker(state: &AppState) -> LearningTracker<SqliteProgressStore> {
    LearningTracker::new(SqliteProgressStore::new(state.db.clone()))
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub status: LearningStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressList {
    pub progress: Vec<CardProgress>,
    pub summary: SessionSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueQuery {
    pub song_id: Uuid,
    pub limit: Option<usize>,
}

/// Card in the study queue with the caller's progress on it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCard {
    #[serde(flatten)]
    pub card: Card,
    pub status: LearningStatus,
    pub review_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyQueue {
    pub song_id: Uuid,
    /// Cards in the song before the limit was applied
    pub total: usize,
    pub cards: Vec<QueuedCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMark {
    pub card_id: Uuid,
    pub status: LearningStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub card_ids: Vec<Uuid>,
    #[serde(default)]
    pub marks: Vec<SessionMark>,
}

/// PUT /api/cards/:card_id/progress
pub async fn mark_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(card_id): Path<Uuid>,
    Json(request): Json<MarkRequest>,
) -> ApiResult<Json<CardProgress>> {
    let user_id = user.require()?;
    visible_card(&state, card_id, &user).await?;

    let progress = tracker(&state).mark(user_id, card_id, request.status).await?;
    Ok(Json(progress))
}

/// GET /api/cards/:card_id/progress
pub async fn get_card_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(card_id): Path<Uuid>,
) -> ApiResult<Json<CardProgress>> {
    let user_id = user.require()?;
    visible_card(&state, card_id, &user).await?;

    let progress = tracker(&state).progress(user_id, card_id).await?;
    Ok(Json(progress))
}

/// GET /api/progress
pub async fn list_progress(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<ProgressList>> {
    let user_id = user.require()?;
    let tracker = tracker(&state);

    let progress = tracker.store().list(user_id).await?;
    let summary = SessionSummary::from_statuses(progress.iter().map(|p| p.status));

    Ok(Json(ProgressList { progress, summary }))
}

/// GET /api/study/queue?songId=..&limit=..
///
/// Unfinished cards first, mastered last, song order otherwise.
pub async fn study_queue(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<StudyQueue>> {
    let song = visible_song(&state, query.song_id, &user).await?;
    let cards = db::cards::list_cards_for_song(&state.db, song.id).await?;
    let total = cards.len();

    let tracker = tracker(&state);
    let mut progress = Vec::with_capacity(cards.len());
    for card in &cards {
        let entry = match user.id() {
            Some(user_id) => tracker.progress(user_id, card.id).await?,
            None => CardProgress::new("", card.id),
        };
        progress.push(entry);
    }

    let items = progress
        .iter()
        .map(|p| StudyItem {
            card_id: p.card_id,
            status: p.status,
        })
        .collect();
    let session = StudySession::new(items, query.limit);

    let queued = session
        .queue()
        .iter()
        .filter_map(|item| {
            let index = cards.iter().position(|c| c.id == item.card_id)?;
            Some(QueuedCard {
                card: cards[index].clone(),
                status: item.status,
                review_count: progress[index].review_count,
            })
        })
        .collect();

    Ok(Json(StudyQueue {
        song_id: song.id,
        total,
        cards: queued,
    }))
}

/// POST /api/study/summary
///
/// Applies the session's marks and reports the resulting status counts.
/// Repeated card ids count once.
pub async fn study_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SummaryRequest>,
) -> ApiResult<Json<SessionSummary>> {
    let tracker = tracker(&state);

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(request.card_ids.len());
    for card_id in request.card_ids.into_iter().filter(|id| seen.insert(*id)) {
        visible_card(&state, card_id, &user).await?;
        let status = match user.id() {
            Some(user_id) => tracker.status(user_id, card_id).await?,
            None => LearningStatus::New,
        };
        items.push(StudyItem { card_id, status });
    }

    let mut session = StudySession::new(items, None);
    if request.marks.is_empty() {
        return Ok(Json(session.summary()));
    }

    let user_id = user.require()?;
    let mut marks = Vec::with_capacity(request.marks.len());
    for mark in &request.marks {
        session.record(mark.card_id, mark.status)?;
        marks.push((mark.card_id, mark.status));
    }
    tracker.mark_all(user_id, &marks).await?;

    Ok(Json(session.summary()))
}

/// Build progress and study routes
pub fn study_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cards/:card_id/progress", get(get_card_progress).put(mark_card))
        .route("/api/progress", get(list_progress))
        .route("/api/study/queue", get(study_queue))
        .route("/api/study/summary", post(study_summary))
}
