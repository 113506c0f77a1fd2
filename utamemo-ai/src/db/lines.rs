//! Lyric line database operations

use super::parse_uuid;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use utamemo_common::models::Line;
use utamemo_common::Result;
use uuid::Uuid;

const LINE_COLUMNS: &str = "id, song_id, line_number, content_ja, content_zh, furigana, tokens, start_ms, end_ms";

pub async fn insert_line<'e, E>(executor: E, line: &Line) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO lines (
            id, song_id, line_number, content_ja, content_zh,
            furigana, tokens, start_ms, end_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(line.id.to_string())
    .bind(line.song_id.to_string())
    .bind(i64::from(line.line_number))
    .bind(&line.content_ja)
    .bind(&line.content_zh)
    .bind(serde_json::to_string(&line.furigana)?)
    .bind(serde_json::to_string(&line.tokens)?)
    .bind(line.start_ms)
    .bind(line.end_ms)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_line(pool: &SqlitePool, id: Uuid) -> Result<Option<Line>> {
    let row = sqlx::query(&format!("SELECT {} FROM lines WHERE id = ?", LINE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(line_from_row).transpose()
}

/// Lines of a song in line-number order
pub async fn list_lines(pool: &SqlitePool, song_id: Uuid) -> Result<Vec<Line>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM lines WHERE song_id = ? ORDER BY line_number",
        LINE_COLUMNS
    ))
    .bind(song_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(line_from_row).collect()
}

fn line_from_row(row: &SqliteRow) -> Result<Line> {
    let id: String = row.get("id");
    let song_id: String = row.get("song_id");
    let line_number: i64 = row.get("line_number");
    let furigana: String = row.get("furigana");
    let tokens: String = row.get("tokens");

    Ok(Line {
        id: parse_uuid(&id)?,
        song_id: parse_uuid(&song_id)?,
        line_number: line_number as u32,
        content_ja: row.get("content_ja"),
        content_zh: row.get("content_zh"),
        furigana: serde_json::from_str(&furigana)?,
        tokens: serde_json::from_str(&tokens)?,
        start_ms: row.get("start_ms"),
        end_ms: row.get("end_ms"),
    })
}
