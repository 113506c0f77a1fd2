//! Domain model shared by utamemo services
//!
//! Songs own lyric lines, lines own vocabulary cards. Conversations record
//! the prompts and raw model replies behind an AI-assisted import.
//!
//! All character offsets (furigana spans, card word positions) count Unicode
//! scalar values of the line's original text, end exclusive.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Songs
// ============================================================================

/// Where the audio for a song comes from. Audio itself is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// File supplied by the user's device
    #[default]
    Local,
    /// Track referenced on a streaming platform
    Platform,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Platform => "platform",
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(SourceKind::Local),
            "platform" => Ok(SourceKind::Platform),
            other => Err(Error::InvalidInput(format!("Unknown song source: {}", other))),
        }
    }
}

/// Imported song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub duration_ms: Option<i64>,
    pub cover_url: Option<String>,
    pub source: SourceKind,
    /// File name or platform track id
    pub source_ref: Option<String>,
    pub is_public: bool,
    /// Owning user, `None` for shared catalog songs
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Song {
    /// Songs are visible to their owner, and to everyone when public
    pub fn is_visible_to(&self, user_id: Option<&str>) -> bool {
        self.is_public || self.user_id.is_none() || self.user_id.as_deref() == user_id
    }
}

// ============================================================================
// Lyric lines
// ============================================================================

/// Reading annotation over a span of the original text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuriganaSpan {
    pub word: String,
    pub reading: String,
    pub start: usize,
    pub end: usize,
}

impl FuriganaSpan {
    /// True when `0 <= start < end <= chars(text)`
    pub fn is_within(&self, text: &str) -> bool {
        self.start < self.end && self.end <= char_len(text)
    }

    /// True when the span is in bounds and covers exactly `word`
    pub fn matches(&self, text: &str) -> bool {
        self.is_within(text) && char_slice(text, self.start, self.end).as_deref() == Some(self.word.as_str())
    }
}

/// Token of a segmented lyric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub surface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
}

impl Token {
    pub fn surface(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            reading: None,
            part_of_speech: None,
        }
    }
}

/// One lyric line of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: Uuid,
    pub song_id: Uuid,
    /// 1-based position within the song
    pub line_number: u32,
    pub content_ja: String,
    pub content_zh: Option<String>,
    pub furigana: Vec<FuriganaSpan>,
    pub tokens: Vec<Token>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl Line {
    /// Check span bounds and time range
    pub fn validate(&self) -> Result<()> {
        if let Some(span) = self.furigana.iter().find(|s| !s.is_within(&self.content_ja)) {
            return Err(Error::InvalidInput(format!(
                "Furigana span {}..{} out of bounds for line {}",
                span.start, span.end, self.line_number
            )));
        }
        if let (Some(start), Some(end)) = (self.start_ms, self.end_ms) {
            if start > end {
                return Err(Error::InvalidInput(format!(
                    "Line {} ends before it starts ({} > {})",
                    self.line_number, start, end
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Cards
// ============================================================================

/// Closed part-of-speech set used on cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Particle,
    #[default]
    Other,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 6] = [
        PartOfSpeech::Noun,
        PartOfSpeech::Verb,
        PartOfSpeech::Adjective,
        PartOfSpeech::Adverb,
        PartOfSpeech::Particle,
        PartOfSpeech::Other,
    ];

    /// Map a free-form tag from a language model into the closed set.
    ///
    /// Unrecognized tags become `Other`; `preposition` is folded into
    /// `Particle` since Japanese has no prepositions.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "noun" | "n" | "名詞" => PartOfSpeech::Noun,
            "verb" | "v" | "動詞" => PartOfSpeech::Verb,
            "adjective" | "adj" | "形容詞" | "形容動詞" => PartOfSpeech::Adjective,
            "adverb" | "adv" | "副詞" => PartOfSpeech::Adverb,
            "particle" | "preposition" | "助詞" => PartOfSpeech::Particle,
            _ => PartOfSpeech::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Particle => "particle",
            PartOfSpeech::Other => "other",
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character span of a card's word inside its line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordSpan {
    pub start: usize,
    pub end: usize,
}

/// Vocabulary card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub line_id: Uuid,
    pub word: String,
    pub reading: String,
    pub meaning: String,
    pub part_of_speech: PartOfSpeech,
    pub example: Option<String>,
    pub example_translation: Option<String>,
    pub word_position: Option<WordSpan>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl FromStr for MessageRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(Error::InvalidInput(format!("Unknown message role: {}", other))),
        }
    }
}

/// Record of one AI-assisted operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub song_id: Option<Uuid>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Position within the conversation, starting at 1
    pub seq: u32,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Character offset helpers
// ============================================================================

/// Length of `text` in characters
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Characters `start..end` of `text`, `None` when out of bounds
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<String> {
    if start > end || end > char_len(text) {
        return None;
    }
    Some(text.chars().skip(start).take(end - start).collect())
}

/// Character offset of the first occurrence of `needle` at or after `from`
pub fn find_char_offset(text: &str, needle: &str, from: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let byte_from = text.char_indices().nth(from).map(|(i, _)| i)?;
    text[byte_from..]
        .find(needle)
        .map(|byte_pos| from + text[byte_from..byte_from + byte_pos].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_normalization() {
        assert_eq!(PartOfSpeech::normalize("pronoun"), PartOfSpeech::Other);
        assert_eq!(PartOfSpeech::normalize("preposition"), PartOfSpeech::Particle);
        assert_eq!(PartOfSpeech::normalize("verb"), PartOfSpeech::Verb);
        assert_eq!(PartOfSpeech::normalize("Adjective "), PartOfSpeech::Adjective);
        assert_eq!(PartOfSpeech::normalize("名詞"), PartOfSpeech::Noun);
        assert_eq!(PartOfSpeech::normalize("interjection!?"), PartOfSpeech::Other);
        assert_eq!(PartOfSpeech::normalize(""), PartOfSpeech::Other);
    }

    #[test]
    fn test_pos_serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&PartOfSpeech::Particle).unwrap();
        assert_eq!(json, "\"particle\"");
        for pos in PartOfSpeech::ALL {
            assert_eq!(PartOfSpeech::normalize(pos.as_str()), pos);
        }
    }

    #[test]
    fn test_char_helpers_count_characters_not_bytes() {
        let text = "君の名は";
        assert_eq!(char_len(text), 4);
        assert_eq!(char_slice(text, 0, 1).as_deref(), Some("君"));
        assert_eq!(char_slice(text, 2, 4).as_deref(), Some("名は"));
        assert_eq!(char_slice(text, 3, 5), None);
        assert_eq!(find_char_offset(text, "名", 0), Some(2));
        assert_eq!(find_char_offset("夢と夢", "夢", 1), Some(2));
        assert_eq!(find_char_offset(text, "空", 0), None);
    }

    #[test]
    fn test_furigana_span_bounds() {
        let text = "夜空を見上げて";
        let good = FuriganaSpan { word: "夜空".into(), reading: "よぞら".into(), start: 0, end: 2 };
        assert!(good.is_within(text));
        assert!(good.matches(text));

        let shifted = FuriganaSpan { start: 1, end: 3, ..good.clone() };
        assert!(shifted.is_within(text));
        assert!(!shifted.matches(text));

        let empty = FuriganaSpan { start: 2, end: 2, ..good.clone() };
        assert!(!empty.is_within(text));

        let overflow = FuriganaSpan { start: 5, end: 8, ..good };
        assert!(!overflow.is_within(text));
    }

    #[test]
    fn test_line_validate_rejects_inverted_time_range() {
        let line = Line {
            id: Uuid::new_v4(),
            song_id: Uuid::new_v4(),
            line_number: 1,
            content_ja: "さよなら".into(),
            content_zh: None,
            furigana: vec![],
            tokens: vec![],
            start_ms: Some(2000),
            end_ms: Some(1000),
        };
        assert!(line.validate().is_err());

        let fixed = Line { end_ms: Some(2000), ..line };
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn test_song_visibility() {
        let song = Song {
            id: Uuid::new_v4(),
            title: "Lemon".into(),
            artist: "米津玄師".into(),
            duration_ms: None,
            cover_url: None,
            source: SourceKind::Platform,
            source_ref: Some("track-1".into()),
            is_public: false,
            user_id: Some("alice".into()),
            created_at: Utc::now(),
        };
        assert!(song.is_visible_to(Some("alice")));
        assert!(!song.is_visible_to(Some("bob")));
        assert!(!song.is_visible_to(None));
    }
}
