//! On-demand card generation for a stored line

use crate::db;
use crate::llm::{transcript_messages, LanguageModel, RecordingModel};
use crate::services::card_generator::{CardGenerationError, CardGenerator, LineContext};
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use utamemo_common::config::ModelProfile;
use utamemo_common::models::{Card, Conversation, Line};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LineCardError {
    #[error(transparent)]
    Generation(#[from] CardGenerationError),

    #[error(transparent)]
    Storage(#[from] utamemo_common::Error),
}

/// Generate up to `count` cards for `line` and store them.
///
/// The exchange is recorded as a conversation whether or not generation
/// succeeds; nothing else is written on failure.
pub async fn generate_line_cards(
    pool: &SqlitePool,
    model: &dyn LanguageModel,
    profile: &ModelProfile,
    user_id: Option<&str>,
    line: &Line,
    count: usize,
) -> Result<Vec<Card>, LineCardError> {
    let recorder = RecordingModel::new(model);
    let generated = CardGenerator::new(&recorder, profile)
        .generate(&LineContext::from(line), count)
        .await;

    let conversation = Conversation {
        id: Uuid::new_v4(),
        user_id: user_id.map(str::to_string),
        song_id: Some(line.song_id),
        title: format!("Cards: line {}", line.line_number),
        created_at: Utc::now(),
    };
    let messages = transcript_messages(conversation.id, &recorder.into_exchanges());

    let mut tx = pool.begin().await.map_err(utamemo_common::Error::from)?;
    db::conversations::insert_transcript(&mut tx, &conversation, &messages).await?;

    let cards: Vec<Card> = match generated {
        Ok(drafts) => drafts.into_iter().map(|draft| draft.into_card(line)).collect(),
        Err(e) => {
            tx.commit().await.map_err(utamemo_common::Error::from)?;
            tracing::warn!(line_id = %line.id, error = %e, "Card generation failed");
            return Err(e.into());
        }
    };

    for card in &cards {
        db::cards::insert_card(&mut *tx, card).await?;
    }
    tx.commit().await.map_err(utamemo_common::Error::from)?;

    tracing::info!(
        line_id = %line.id,
        requested = count,
        created = cards.len(),
        conversation_id = %conversation.id,
        "Cards generated for line"
    );

    Ok(cards)
}
