//! Song database operations

use super::{format_timestamp, parse_timestamp, parse_uuid};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use utamemo_common::models::{SourceKind, Song};
use utamemo_common::Result;
use uuid::Uuid;

const SONG_COLUMNS: &str =
    "id, title, artist, duration_ms, cover_url, source, source_ref, is_public, user_id, created_at";

pub async fn insert_song<'e, E>(executor: E, song: &Song) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO songs (
            id, title, artist, duration_ms, cover_url, source, source_ref,
            is_public, user_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(song.id.to_string())
    .bind(&song.title)
    .bind(&song.artist)
    .bind(song.duration_ms)
    .bind(&song.cover_url)
    .bind(song.source.as_str())
    .bind(&song.source_ref)
    .bind(song.is_public)
    .bind(&song.user_id)
    .bind(format_timestamp(&song.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_song(pool: &SqlitePool, id: Uuid) -> Result<Option<Song>> {
    let row = sqlx::query(&format!("SELECT {} FROM songs WHERE id = ?", SONG_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(song_from_row).transpose()
}

/// Public songs plus songs owned by `user_id`, newest first
pub async fn list_visible_songs(pool: &SqlitePool, user_id: Option<&str>) -> Result<Vec<Song>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM songs
         WHERE is_public = 1 OR user_id IS NULL OR user_id = ?
         ORDER BY created_at DESC, title",
        SONG_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(song_from_row).collect()
}

/// Delete a song; lines, cards, and progress go with it.
///
/// Returns false when no such song existed.
pub async fn delete_song(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn song_from_row(row: &SqliteRow) -> Result<Song> {
    let id: String = row.get("id");
    let source: String = row.get("source");
    let created_at: String = row.get("created_at");

    Ok(Song {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        artist: row.get("artist"),
        duration_ms: row.get("duration_ms"),
        cover_url: row.get("cover_url"),
        source: source.parse::<SourceKind>()?,
        source_ref: row.get("source_ref"),
        is_public: row.get("is_public"),
        user_id: row.get("user_id"),
        created_at: parse_timestamp(&created_at)?,
    })
}
