//! Vocabulary card generation for one lyric line
//!
//! Unlike annotation, card generation has no fallback: a transport error or
//! an unparseable reply is returned to the caller.

use crate::llm::{CompletionRequest, LanguageModel, LlmError, LlmTask};
use crate::services::json_extract::{array_items, as_usize, extract_json, snippet, str_field};
use crate::services::prompts;
use crate::services::spans::locate_word;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utamemo_common::config::ModelProfile;
use utamemo_common::models::{Card, FuriganaSpan, Line, PartOfSpeech, WordSpan};
use uuid::Uuid;

/// Upper bound on cards requested for a single line
pub const MAX_CARDS_PER_REQUEST: usize = 5;

/// The parts of a line a card prompt needs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineContext {
    pub content_ja: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_zh: Option<String>,
    pub furigana: Vec<FuriganaSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
}

impl From<&Line> for LineContext {
    fn from(line: &Line) -> Self {
        Self {
            content_ja: line.content_ja.clone(),
            content_zh: line.content_zh.clone().filter(|zh| !zh.is_empty()),
            furigana: line.furigana.clone(),
            start_ms: line.start_ms,
            end_ms: line.end_ms,
        }
    }
}

/// Card content as proposed by the model, before it is attached to a line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    pub word: String,
    pub reading: String,
    pub meaning: String,
    pub part_of_speech: PartOfSpeech,
    pub word_position: Option<WordSpan>,
}

impl CardDraft {
    /// Attach to `line`; the line text serves as the card's example
    pub fn into_card(self, line: &Line) -> Card {
        Card {
            id: Uuid::new_v4(),
            line_id: line.id,
            word: self.word,
            reading: self.reading,
            meaning: self.meaning,
            part_of_speech: self.part_of_speech,
            example: Some(line.content_ja.clone()),
            example_translation: line.content_zh.clone().filter(|zh| !zh.is_empty()),
            word_position: self.word_position,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CardGenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Card reply could not be parsed: {0}")]
    InvalidResponse(String),
}

impl CardGenerationError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, CardGenerationError::Llm(e) if e.is_configuration())
    }
}

/// Generates vocabulary cards through a language model
pub struct CardGenerator<'a> {
    model: &'a dyn LanguageModel,
    profile: &'a ModelProfile,
}

impl<'a> CardGenerator<'a> {
    pub fn new(model: &'a dyn LanguageModel, profile: &'a ModelProfile) -> Self {
        Self { model, profile }
    }

    /// Request `count` cards (clamped to 1..=5) for `line`.
    ///
    /// Returns at most `count` drafts in reply order. Entries without a
    /// word are skipped.
    pub async fn generate(&self, line: &LineContext, count: usize) -> Result<Vec<CardDraft>, CardGenerationError> {
        let count = count.clamp(1, MAX_CARDS_PER_REQUEST);
        let prompt = prompts::card_prompt(line, count);
        let request = CompletionRequest::new(LlmTask::CardGeneration, prompt, self.profile);

        let reply = self.model.complete(&request).await?;

        let value = extract_json(&reply).ok_or_else(|| {
            tracing::warn!(reply = %snippet(&reply, 200), "No JSON in card generation reply");
            CardGenerationError::InvalidResponse("no JSON object in reply".to_string())
        })?;

        let entries = value
            .get("cards")
            .and_then(Value::as_array)
            .ok_or_else(|| CardGenerationError::InvalidResponse("missing \"cards\" array".to_string()))?;

        let drafts: Vec<CardDraft> = entries
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|entry| parse_draft(entry, &line.content_ja))
            .take(count)
            .collect();

        tracing::debug!(
            requested = count,
            offered = entries.len(),
            kept = drafts.len(),
            "Cards generated"
        );

        Ok(drafts)
    }
}

fn parse_draft(entry: &Map<String, Value>, line_text: &str) -> Option<CardDraft> {
    let word = str_field(entry, &["word", "surface", "term"])?;
    let part_of_speech = str_field(entry, &["partOfSpeech", "part_of_speech", "pos"])
        .map(|raw| PartOfSpeech::normalize(&raw))
        .unwrap_or_default();

    let hint = entry
        .get("wordPosition")
        .or_else(|| entry.get("word_position"))
        .and_then(position_hint);

    Some(CardDraft {
        reading: str_field(entry, &["reading", "kana", "furigana"]).unwrap_or_default(),
        meaning: str_field(entry, &["meaning", "definition", "translation"]).unwrap_or_default(),
        part_of_speech,
        word_position: locate_word(line_text, &word, hint, 0),
        word,
    })
}

/// `{"start":..,"end":..}` or `[start, end]`
fn position_hint(value: &Value) -> Option<(usize, usize)> {
    match value {
        Value::Object(obj) => Some((obj.get("start").and_then(as_usize)?, obj.get("end").and_then(as_usize)?)),
        Value::Array(_) => {
            let items = array_items(Some(value));
            Some((as_usize(items.first()?)?, as_usize(items.get(1)?)?))
        }
        _ => None,
    }
}
