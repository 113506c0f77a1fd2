//! HTTP API handlers for utamemo-ai

pub mod cards;
pub mod conversations;
pub mod health;
pub mod settings;
pub mod songs;
pub mod study;
pub mod user;

pub use cards::card_routes;
pub use conversations::conversation_routes;
pub use health::health_routes;
pub use settings::settings_routes;
pub use songs::song_routes;
pub use study::study_routes;
pub use user::CurrentUser;

use crate::{ApiError, ApiResult, AppState};
use utamemo_common::models::{Card, Line, Song};
use uuid::Uuid;

/// Song the caller may see; invisible songs look absent
pub(crate) async fn visible_song(state: &AppState, song_id: Uuid, user: &CurrentUser) -> ApiResult<Song> {
    crate::db::songs::get_song(&state.db, song_id)
        .await?
        .filter(|song| song.is_visible_to(user.id()))
        .ok_or_else(|| ApiError::NotFound(format!("Song {}", song_id)))
}

/// Line of a song the caller may see, with that song
pub(crate) async fn visible_line(state: &AppState, line_id: Uuid, user: &CurrentUser) -> ApiResult<(Song, Line)> {
    let line = crate::db::lines::get_line(&state.db, line_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Line {}", line_id)))?;
    let song = visible_song(state, line.song_id, user)
        .await
        .map_err(|_| ApiError::NotFound(format!("Line {}", line_id)))?;
    Ok((song, line))
}

/// Card of a song the caller may see, with that song
pub(crate) async fn visible_card(state: &AppState, card_id: Uuid, user: &CurrentUser) -> ApiResult<(Song, Card)> {
    let not_found = || ApiError::NotFound(format!("Card {}", card_id));

    let card = crate::db::cards::get_card(&state.db, card_id)
        .await?
        .ok_or_else(not_found)?;
    let song_id = crate::db::cards::song_id_for_card(&state.db, card_id)
        .await?
        .ok_or_else(not_found)?;
    let song = visible_song(state, song_id, user).await.map_err(|_| not_found())?;
    Ok((song, card))
}

/// Songs with an owner may only be changed by that owner
pub(crate) fn ensure_owner(song: &Song, user: &CurrentUser) -> ApiResult<()> {
    match song.user_id.as_deref() {
        None => Ok(()),
        Some(owner) if user.id() == Some(owner) => Ok(()),
        Some(_) => Err(ApiError::Forbidden(format!("Song {} belongs to another user", song.id))),
    }
}
