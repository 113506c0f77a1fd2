//! SQLite-backed card progress

use super::{format_timestamp, parse_timestamp, parse_uuid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use utamemo_common::learning::{CardProgress, LearningStatus, ProgressStore};
use utamemo_common::Result;
use uuid::Uuid;

/// [`ProgressStore`] over the `card_progress` table
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn load(&self, user_id: &str, card_id: Uuid) -> Result<Option<CardProgress>> {
        let row = sqlx::query(
            "SELECT user_id, card_id, status, review_count, last_reviewed_at
             FROM card_progress WHERE user_id = ? AND card_id = ?",
        )
        .bind(user_id)
        .bind(card_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(progress_from_row).transpose()
    }

    async fn apply_marks(
        &self,
        user_id: &str,
        marks: &[(Uuid, LearningStatus)],
        at: DateTime<Utc>,
    ) -> Result<Vec<CardProgress>> {
        let reviewed_at = format_timestamp(&at);
        let mut tx = self.pool.begin().await?;
        let mut applied = Vec::with_capacity(marks.len());

        for (card_id, status) in marks {
            // Counter is incremented by SQLite itself
            let row = sqlx::query(
                r#"
                INSERT INTO card_progress (user_id, card_id, status, review_count, last_reviewed_at)
                VALUES (?, ?, ?, 1, ?)
                ON CONFLICT(user_id, card_id) DO UPDATE SET
                    status = excluded.status,
                    review_count = card_progress.review_count + 1,
                    last_reviewed_at = excluded.last_reviewed_at
                RETURNING user_id, card_id, status, review_count, last_reviewed_at
                "#,
            )
            .bind(user_id)
            .bind(card_id.to_string())
            .bind(status.as_str())
            .bind(&reviewed_at)
            .fetch_one(&mut *tx)
            .await?;

            applied.push(progress_from_row(&row)?);
        }

        tx.commit().await?;
        Ok(applied)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<CardProgress>> {
        let rows = sqlx::query(
            "SELECT user_id, card_id, status, review_count, last_reviewed_at
             FROM card_progress WHERE user_id = ? ORDER BY card_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(progress_from_row).collect()
    }
}

fn progress_from_row(row: &SqliteRow) -> Result<CardProgress> {
    let card_id: String = row.get("card_id");
    let status: String = row.get("status");
    let review_count: i64 = row.get("review_count");
    let last_reviewed_at: Option<String> = row.get("last_reviewed_at");

    Ok(CardProgress {
        user_id: row.get("user_id"),
        card_id: parse_uuid(&card_id)?,
        status: status.parse::<LearningStatus>()?,
        review_count: review_count.clamp(0, i64::from(u32::MAX)) as u32,
        last_reviewed_at: last_reviewed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
