//! Song import pipeline
//!
//! Raw lyric lines → timing → annotation → optional cards → one database
//! transaction. Every model exchange made along the way is saved as a
//! conversation attached to the new song.

use crate::db;
use crate::llm::{transcript_messages, LanguageModel, RecordingModel};
use crate::services::batch_annotator::{placeholders, BatchAnnotator};
use crate::services::card_generator::{CardGenerator, LineContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utamemo_common::config::LlmConfig;
use utamemo_common::lrc::parse_lyrics;
use utamemo_common::models::{Card, Conversation, Line, Song, SourceKind};
use utamemo_common::{Error, Result};
use uuid::Uuid;

/// Largest `cardsPerLine` accepted on import
pub const MAX_CARDS_PER_LINE: usize = 3;

/// Song metadata supplied by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongInput {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub duration_ms: Option<i64>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub source: SourceKind,
    pub source_ref: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    #[serde(rename = "parseWithAI", alias = "parseWithAi", default = "default_true")]
    pub parse_with_ai: bool,
    #[serde(default)]
    pub generate_cards: bool,
    #[serde(default = "default_cards_per_line")]
    pub cards_per_line: usize,
}

fn default_true() -> bool {
    true
}

fn default_cards_per_line() -> usize {
    1
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            parse_with_ai: true,
            generate_cards: false,
            cards_per_line: default_cards_per_line(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub song: SongInput,
    pub lines: Vec<String>,
    #[serde(default)]
    pub options: ImportOptions,
}

impl ImportRequest {
    pub fn validate(&self) -> Result<()> {
        if self.song.title.trim().is_empty() {
            return Err(Error::InvalidInput("Song title must not be empty".to_string()));
        }
        if self.song.duration_ms.is_some_and(|ms| ms < 0) {
            return Err(Error::InvalidInput("durationMs must not be negative".to_string()));
        }
        if !(1..=MAX_CARDS_PER_LINE).contains(&self.options.cards_per_line) {
            return Err(Error::InvalidInput(format!(
                "cardsPerLine must be between 1 and {}",
                MAX_CARDS_PER_LINE
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub song_id: Uuid,
    pub line_count: usize,
    pub annotated_line_count: usize,
    pub card_count: usize,
    pub card_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

pub struct SongImporter<'a> {
    pool: &'a SqlitePool,
    model: &'a dyn LanguageModel,
    llm: &'a LlmConfig,
}

impl<'a> SongImporter<'a> {
    pub fn new(pool: &'a SqlitePool, model: &'a dyn LanguageModel, llm: &'a LlmConfig) -> Self {
        Self { pool, model, llm }
    }

    pub async fn import(&self, user_id: Option<&str>, request: ImportRequest) -> Result<ImportReport> {
        request.validate()?;
        let ImportRequest { song: input, lines, options } = request;

        let timed = parse_lyrics(&lines, input.duration_ms);
        if timed.is_empty() {
            return Err(Error::InvalidInput("No lyric lines to import".to_string()));
        }
        let texts: Vec<String> = timed.iter().map(|line| line.text.clone()).collect();

        let song = Song {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            artist: input.artist.trim().to_string(),
            duration_ms: input.duration_ms,
            cover_url: input.cover_url,
            source: input.source,
            source_ref: input.source_ref,
            is_public: input.is_public,
            user_id: user_id.map(str::to_string),
            created_at: Utc::now(),
        };

        tracing::info!(
            song_id = %song.id,
            title = %song.title,
            lines = texts.len(),
            parse_with_ai = options.parse_with_ai,
            generate_cards = options.generate_cards,
            model = self.model.name(),
            "Starting song import"
        );

        let recorder = RecordingModel::new(self.model);

        let annotated = if options.parse_with_ai {
            BatchAnnotator::new(&recorder, &self.llm.lyric_parsing)
                .with_chunk_size(self.llm.chunk_size)
                .annotate(&texts)
                .await
        } else {
            placeholders(&texts)
        };
        let annotated_line_count = annotated.iter().filter(|line| !line.is_placeholder()).count();

        let song_lines: Vec<Line> = annotated
            .into_iter()
            .zip(timed)
            .map(|(annotation, timing)| Line {
                id: Uuid::new_v4(),
                song_id: song.id,
                line_number: annotation.line_number,
                content_ja: annotation.content_ja,
                content_zh: Some(annotation.content_zh).filter(|zh| !zh.is_empty()),
                furigana: annotation.furigana,
                tokens: annotation.tokens,
                start_ms: timing.start_ms,
                end_ms: timing.end_ms,
            })
            .collect();
        for line in &song_lines {
            line.validate()?;
        }

        let mut cards: Vec<Card> = Vec::new();
        let mut card_failures = 0usize;

        if options.generate_cards {
            let generator = CardGenerator::new(&recorder, &self.llm.card_generation);

            for (index, line) in song_lines.iter().enumerate() {
                match generator.generate(&LineContext::from(line), options.cards_per_line).await {
                    Ok(drafts) => cards.extend(drafts.into_iter().map(|draft| draft.into_card(line))),
                    Err(e) => {
                        card_failures += 1;
                        tracing::warn!(
                            song_id = %song.id,
                            line_number = line.line_number,
                            error = %e,
                            "Card generation failed for line"
                        );
                        if e.is_configuration() {
                            let skipped = song_lines.len() - index - 1;
                            card_failures += skipped;
                            tracing::warn!(skipped, "Language model not usable, skipping remaining lines");
                            break;
                        }
                    }
                }
            }
        }

        let exchanges = recorder.into_exchanges();

        let mut tx = self.pool.begin().await?;

        db::songs::insert_song(&mut *tx, &song).await?;
        for line in &song_lines {
            db::lines::insert_line(&mut *tx, line).await?;
        }
        for card in &cards {
            db::cards::insert_card(&mut *tx, card).await?;
        }

        let conversation_id = if exchanges.is_empty() {
            None
        } else {
            let conversation = Conversation {
                id: Uuid::new_v4(),
                user_id: song.user_id.clone(),
                song_id: Some(song.id),
                title: format!("Import: {}", song.title),
                created_at: Utc::now(),
            };
            let messages = transcript_messages(conversation.id, &exchanges);
            db::conversations::insert_transcript(&mut tx, &conversation, &messages).await?;
            Some(conversation.id)
        };

        tx.commit().await?;

        let report = ImportReport {
            song_id: song.id,
            line_count: song_lines.len(),
            annotated_line_count,
            card_count: cards.len(),
            card_failures,
            conversation_id,
        };

        tracing::info!(
            song_id = %song.id,
            lines = report.line_count,
            annotated = report.annotated_line_count,
            cards = report.card_count,
            card_failures = report.card_failures,
            "Song import complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::llm::scripted::ScriptedModel;
    use crate::llm::{LlmError, LlmTask, MockLanguageModel};
    use serde_json::json;

    fn request(lines: &[&str], options: ImportOptions) -> ImportRequest {
        ImportRequest {
            song: SongInput {
                title: "夢の歌".to_string(),
                artist: "テスト".to_string(),
                duration_ms: Some(30_000),
                cover_url: None,
                source: SourceKind::Local,
                source_ref: None,
                is_public: false,
            },
            lines: lines.iter().map(|s| s.to_string()).collect(),
            options,
        }
    }

    #[test]
    fn test_options_defaults_from_json() {
        let parsed: ImportRequest = serde_json::from_value(json!({
            "song": {"title": "t"},
            "lines": ["a"],
        }))
        .unwrap();
        assert!(parsed.options.parse_with_ai);
        assert!(!parsed.options.generate_cards);
        assert_eq!(parsed.options.cards_per_line, 1);
        assert_eq!(parsed.song.source, SourceKind::Local);

        let explicit: ImportOptions =
            serde_json::from_value(json!({"parseWithAI": false, "generateCards": true, "cardsPerLine": 3})).unwrap();
        assert!(!explicit.parse_with_ai);
        assert_eq!(explicit.cards_per_line, 3);
    }

    #[test]
    fn test_validation() {
        let mut req = request(&["a"], ImportOptions::default());
        assert!(req.validate().is_ok());

        req.options.cards_per_line = 4;
        assert!(matches!(req.validate(), Err(Error::InvalidInput(_))));

        req.options.cards_per_line = 0;
        assert!(req.validate().is_err());

        req.options.cards_per_line = 1;
        req.song.title = "  ".to_string();
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn test_import_with_mock_model() {
        let pool = setup_test_db().await;
        let model = MockLanguageModel::with_seed(0, 1);
        let config = LlmConfig::default();
        let options = ImportOptions {
            parse_with_ai: true,
            generate_cards: true,
            cards_per_line: 2,
        };

        let report = SongImporter::new(&pool, &model, &config)
            .import(
                Some("alice"),
                request(&["[00:01.00]君の夢を見た", "", "[00:05.50]空を見上げて"], options),
            )
            .await
            .unwrap();

        assert_eq!(report.line_count, 2);
        assert_eq!(report.annotated_line_count, 2);
        assert_eq!(report.card_count, 4);
        assert_eq!(report.card_failures, 0);

        let lines = db::lines::list_lines(&pool, report.song_id).await.unwrap();
        assert_eq!(lines[0].content_ja, "君の夢を見た");
        assert_eq!(lines[0].start_ms, Some(1000));
        assert_eq!(lines[0].end_ms, Some(5500));
        assert_eq!(lines[1].end_ms, Some(30_000));
        assert!(lines.iter().all(|line| line.furigana.iter().all(|s| s.matches(&line.content_ja))));

        let conversation_id = report.conversation_id.unwrap();
        let messages = db::conversations::list_messages(&pool, conversation_id).await.unwrap();
        // one annotation chunk + two card requests, three messages each
        assert_eq!(messages.len(), 9);
    }

    #[tokio::test]
    async fn test_import_without_ai_makes_no_requests() {
        let pool = setup_test_db().await;
        let model = ScriptedModel::new(Vec::new());
        let config = LlmConfig::default();
        let options = ImportOptions {
            parse_with_ai: false,
            ..ImportOptions::default()
        };

        let report = SongImporter::new(&pool, &model, &config)
            .import(None, request(&["一行目", "二行目"], options))
            .await
            .unwrap();

        assert_eq!(report.line_count, 2);
        assert_eq!(report.annotated_line_count, 0);
        assert_eq!(report.conversation_id, None);
        assert!(model.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_card_failures_do_not_abort_import() {
        let pool = setup_test_db().await;
        let model = ScriptedModel::from_fn(|request| match request.task {
            LlmTask::LyricParsing => Err(LlmError::Api(500, "down".into())),
            LlmTask::CardGeneration if request.user.contains("一行目") => Ok("garbage".into()),
            LlmTask::CardGeneration => {
                Ok(json!({"cards": [{"word": "二", "reading": "に", "meaning": "二"}]}).to_string())
            }
        });
        let config = LlmConfig::default();
        let options = ImportOptions {
            parse_with_ai: true,
            generate_cards: true,
            cards_per_line: 1,
        };

        let report = SongImporter::new(&pool, &model, &config)
            .import(None, request(&["一行目", "二行目"], options))
            .await
            .unwrap();

        assert_eq!(report.line_count, 2);
        assert_eq!(report.annotated_line_count, 0);
        assert_eq!(report.card_failures, 1);
        assert_eq!(report.card_count, 1);
    }

    #[tokio::test]
    async fn test_configuration_error_stops_card_generation() {
        let pool = setup_test_db().await;
        let model = ScriptedModel::from_fn(|_| Err(LlmError::Unauthorized(401)));
        let config = LlmConfig::default();
        let options = ImportOptions {
            parse_with_ai: false,
            generate_cards: true,
            cards_per_line: 1,
        };

        let report = SongImporter::new(&pool, &model, &config)
            .import(None, request(&["一", "二", "三"], options))
            .await
            .unwrap();

        assert_eq!(report.card_failures, 3);
        assert_eq!(model.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_lyrics_rejected() {
        let pool = setup_test_db().await;
        let model = MockLanguageModel::new(0);
        let config = LlmConfig::default();

        let result = SongImporter::new(&pool, &model, &config)
            .import(None, request(&["", "   ", "[ti:Title]"], ImportOptions::default()))
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(db::songs::list_visible_songs(&pool, None).await.unwrap().is_empty());
    }
}
