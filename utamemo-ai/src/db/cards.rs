//! Vocabulary card database operations

use super::{format_timestamp, parse_timestamp, parse_uuid};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use utamemo_common::models::{Card, PartOfSpeech, WordSpan};
use utamemo_common::Result;
use uuid::Uuid;

const CARD_COLUMNS: &str = "c.id, c.line_id, c.word, c.reading, c.meaning, c.part_of_speech, \
                            c.example, c.example_translation, c.word_start, c.word_end, c.created_at";

pub async fn insert_card<'e, E>(executor: E, card: &Card) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO cards (
            id, line_id, word, reading, meaning, part_of_speech,
            example, example_translation, word_start, word_end, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(card.id.to_string())
    .bind(card.line_id.to_string())
    .bind(&card.word)
    .bind(&card.reading)
    .bind(&card.meaning)
    .bind(card.part_of_speech.as_str())
    .bind(&card.example)
    .bind(&card.example_translation)
    .bind(card.word_position.map(|p| p.start as i64))
    .bind(card.word_position.map(|p| p.end as i64))
    .bind(format_timestamp(&card.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_card(pool: &SqlitePool, id: Uuid) -> Result<Option<Card>> {
    let row = sqlx::query(&format!("SELECT {} FROM cards c WHERE c.id = ?", CARD_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(card_from_row).transpose()
}

/// Cards of a song ordered by line number, then creation order
pub async fn list_cards_for_song(pool: &SqlitePool, song_id: Uuid) -> Result<Vec<Card>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM cards c
         JOIN lines l ON l.id = c.line_id
         WHERE l.song_id = ?
         ORDER BY l.line_number, c.created_at, c.rowid",
        CARD_COLUMNS
    ))
    .bind(song_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(card_from_row).collect()
}

/// Cards of one line in creation order
pub async fn list_cards_for_line(pool: &SqlitePool, line_id: Uuid) -> Result<Vec<Card>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM cards c WHERE c.line_id = ? ORDER BY c.created_at, c.rowid",
        CARD_COLUMNS
    ))
    .bind(line_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(card_from_row).collect()
}

/// Song a card belongs to, through its line
pub async fn song_id_for_card(pool: &SqlitePool, card_id: Uuid) -> Result<Option<Uuid>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT l.song_id FROM cards c JOIN lines l ON l.id = c.line_id WHERE c.id = ?",
    )
    .bind(card_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|(id,)| parse_uuid(&id)).transpose()
}

/// Delete a card and its progress rows. Returns false when absent.
pub async fn delete_card(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn card_from_row(row: &SqliteRow) -> Result<Card> {
    let id: String = row.get("id");
    let line_id: String = row.get("line_id");
    let part_of_speech: String = row.get("part_of_speech");
    let word_start: Option<i64> = row.get("word_start");
    let word_end: Option<i64> = row.get("word_end");
    let created_at: String = row.get("created_at");

    Ok(Card {
        id: parse_uuid(&id)?,
        line_id: parse_uuid(&line_id)?,
        word: row.get("word"),
        reading: row.get("reading"),
        meaning: row.get("meaning"),
        part_of_speech: PartOfSpeech::normalize(&part_of_speech),
        example: row.get("example"),
        example_translation: row.get("example_translation"),
        word_position: match (word_start, word_end) {
            (Some(start), Some(end)) => Some(WordSpan {
                start: start as usize,
                end: end as usize,
            }),
            _ => None,
        },
        created_at: parse_timestamp(&created_at)?,
    })
}
