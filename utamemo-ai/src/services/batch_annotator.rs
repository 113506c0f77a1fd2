//! Chunked lyric annotation
//!
//! Lines are sent to the model in fixed-size chunks, one chunk at a time.
//! A chunk that fails for any reason (transport error, no JSON, wrong shape)
//! degrades to placeholder lines instead of failing the whole song, so the
//! output always has exactly one entry per input line, numbered 1..=N.

use crate::llm::{CompletionRequest, LanguageModel, LlmError, LlmTask};
use crate::services::json_extract::{array_items, as_usize, extract_json, snippet, str_field, usize_field};
use crate::services::prompts;
use crate::services::spans::{align_furigana, RawSpan};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utamemo_common::config::ModelProfile;
use utamemo_common::models::{FuriganaSpan, Token};

/// Lines per model request
pub const DEFAULT_CHUNK_SIZE: usize = 8;

/// One annotated lyric line, numbered within the whole song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLine {
    pub line_number: u32,
    pub content_ja: String,
    pub content_zh: String,
    pub furigana: Vec<FuriganaSpan>,
    pub tokens: Vec<Token>,
}

impl AnnotatedLine {
    /// Unannotated stand-in: original text, empty translation, spans and tokens
    pub fn placeholder(line_number: u32, text: &str) -> Self {
        Self {
            line_number,
            content_ja: text.to_string(),
            content_zh: String::new(),
            furigana: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.content_zh.is_empty() && self.furigana.is_empty() && self.tokens.is_empty()
    }
}

/// Placeholders for every line, numbered from 1
pub fn placeholders(lines: &[String]) -> Vec<AnnotatedLine> {
    lines
        .iter()
        .enumerate()
        .map(|(index, text)| AnnotatedLine::placeholder(index as u32 + 1, text))
        .collect()
}

#[derive(Debug, Error)]
enum ChunkError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("reply contained no JSON object")]
    NoJson,

    #[error("reply has no \"lines\" array")]
    MissingLines,
}

/// Annotates lyric lines through a language model
pub struct BatchAnnotator<'a> {
    model: &'a dyn LanguageModel,
    profile: &'a ModelProfile,
    chunk_size: usize,
}

impl<'a> BatchAnnotator<'a> {
    pub fn new(model: &'a dyn LanguageModel, profile: &'a ModelProfile) -> Self {
        Self {
            model,
            profile,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Annotate `lines`, one chunk after another.
    ///
    /// Never fails: output length equals input length, `line_number` runs
    /// 1..=N, and `content_ja` is always the input text.
    pub async fn annotate(&self, lines: &[String]) -> Vec<AnnotatedLine> {
        let mut annotated = Vec::with_capacity(lines.len());

        for (chunk_index, chunk) in lines.chunks(self.chunk_size).enumerate() {
            let offset = chunk_index * self.chunk_size;

            match self.annotate_chunk(chunk, offset).await {
                Ok(lines) => annotated.extend(lines),
                Err(e) => {
                    tracing::warn!(
                        chunk = chunk_index,
                        first_line = offset + 1,
                        lines = chunk.len(),
                        error = %e,
                        "Chunk annotation failed, using placeholders"
                    );
                    annotated.extend(
                        chunk
                            .iter()
                            .enumerate()
                            .map(|(i, text)| AnnotatedLine::placeholder((offset + i + 1) as u32, text)),
                    );
                }
            }
        }

        let placeholder_count = annotated.iter().filter(|line| line.is_placeholder()).count();
        tracing::info!(
            lines = lines.len(),
            chunks = lines.len().div_ceil(self.chunk_size),
            placeholders = placeholder_count,
            "Lyric annotation complete"
        );

        annotated
    }

    async fn annotate_chunk(&self, chunk: &[String], offset: usize) -> Result<Vec<AnnotatedLine>, ChunkError> {
        let prompt = prompts::lyric_parse_prompt(chunk);
        let request = CompletionRequest::new(LlmTask::LyricParsing, prompt, self.profile);
        let reply = self.model.complete(&request).await?;

        let value = extract_json(&reply).ok_or_else(|| {
            tracing::warn!(reply = %snippet(&reply, 200), "No JSON in lyric annotation reply");
            ChunkError::NoJson
        })?;

        let entries = value
            .get("lines")
            .and_then(Value::as_array)
            .ok_or(ChunkError::MissingLines)?;

        Ok(assemble_chunk(chunk, offset, entries))
    }
}

/// Match reply entries to chunk lines.
///
/// An entry's `lineNumber` may be chunk-local (1..=k) or song-global
/// (offset+1..=offset+k); entries without a usable number are matched by
/// position. Lines left unmatched become placeholders.
fn assemble_chunk(chunk: &[String], offset: usize, entries: &[Value]) -> Vec<AnnotatedLine> {
    let size = chunk.len();
    let mut slots: Vec<Option<AnnotatedLine>> = vec![None; size];

    for (position, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };

        let index = match usize_field(obj, &["lineNumber", "line_number", "line"]) {
            Some(n) if (1..=size).contains(&n) => n - 1,
            Some(n) if n > offset && n <= offset + size => n - offset - 1,
            _ => position,
        };

        if index >= size || slots[index].is_some() {
            continue;
        }

        let text = &chunk[index];
        slots[index] = Some(AnnotatedLine {
            line_number: (offset + index + 1) as u32,
            content_ja: text.clone(),
            content_zh: str_field(obj, &["contentZh", "content_zh", "translation", "zh"]).unwrap_or_default(),
            furigana: align_furigana(text, raw_spans(obj)),
            tokens: tokens(obj),
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                tracing::debug!(line = offset + index + 1, "Line missing from model reply");
                AnnotatedLine::placeholder((offset + index + 1) as u32, &chunk[index])
            })
        })
        .collect()
}

fn raw_spans(obj: &Map<String, Value>) -> Vec<RawSpan> {
    array_items(obj.get("furigana"))
        .iter()
        .filter_map(Value::as_object)
        .map(|span| RawSpan {
            word: str_field(span, &["word", "surface", "text"]).unwrap_or_default(),
            reading: str_field(span, &["reading", "furigana", "kana"]).unwrap_or_default(),
            start: span.get("start").and_then(as_usize),
            end: span.get("end").and_then(as_usize),
        })
        .collect()
}

fn tokens(obj: &Map<String, Value>) -> Vec<Token> {
    array_items(obj.get("tokens"))
        .iter()
        .filter_map(|item| match item {
            Value::String(surface) if !surface.trim().is_empty() => Some(Token::surface(surface.trim())),
            Value::Object(token) => str_field(token, &["surface", "word", "text"]).map(|surface| Token {
                surface,
                reading: str_field(token, &["reading", "kana"]),
                part_of_speech: str_field(token, &["partOfSpeech", "part_of_speech", "pos"]),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedModel;
    use serde_json::json;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("歌詞{}行目", i)).collect()
    }

    /// Echoes every prompted line back annotated, numbered chunk-locally
    fn echo_model() -> ScriptedModel {
        ScriptedModel::from_fn(|request| {
            let payload = extract_json(&request.user).ok_or(LlmError::EmptyResponse)?;
            let entries: Vec<Value> = payload["lines"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|line| {
                    json!({
                        "lineNumber": line["lineNumber"],
                        "contentJa": line["text"],
                        "contentZh": format!("译:{}", line["text"].as_str().unwrap_or_default()),
                        "furigana": [{"word": "歌詞", "reading": "かし", "start": 0, "end": 2}],
                        "tokens": [{"surface": "歌詞", "reading": "かし", "partOfSpeech": "noun"}],
                    })
                })
                .collect();
            Ok(format!("```json\n{}\n```", json!({ "lines": entries })))
        })
    }

    fn assert_shape(input: &[String], output: &[AnnotatedLine]) {
        assert_eq!(output.len(), input.len());
        for (i, line) in output.iter().enumerate() {
            assert_eq!(line.line_number as usize, i + 1);
            assert_eq!(line.content_ja, input[i]);
            assert!(line.furigana.iter().all(|span| span.matches(&line.content_ja)));
        }
    }

    #[tokio::test]
    async fn test_length_and_numbering_across_chunk_sizes() {
        let profile = ModelProfile::lyric_parsing_default();
        for n in [0, 1, 7, 8, 9, 16, 17, 25] {
            let input = lines(n);
            let model = echo_model();
            let output = BatchAnnotator::new(&model, &profile).annotate(&input).await;

            assert_shape(&input, &output);
            assert!(output.iter().all(|line| !line.is_placeholder()));
            assert_eq!(model.requests().await.len(), n.div_ceil(DEFAULT_CHUNK_SIZE));
        }
    }

    #[tokio::test]
    async fn test_custom_chunk_size() {
        let profile = ModelProfile::lyric_parsing_default();
        let input = lines(10);
        let model = echo_model();
        let output = BatchAnnotator::new(&model, &profile)
            .with_chunk_size(3)
            .annotate(&input)
            .await;

        assert_shape(&input, &output);
        assert_eq!(model.requests().await.len(), 4);
        assert_eq!(output[9].content_zh, "译:歌詞10行目");
    }

    #[tokio::test]
    async fn test_failed_chunk_becomes_placeholders() {
        let profile = ModelProfile::lyric_parsing_default();
        let input = lines(17);
        let ok_reply = |range: std::ops::RangeInclusive<usize>| -> Result<String, LlmError> {
            let entries: Vec<Value> = range
                .map(|n| json!({"lineNumber": n, "contentZh": "译", "furigana": [], "tokens": []}))
                .collect();
            Ok(json!({ "lines": entries }).to_string())
        };
        let model = ScriptedModel::new(vec![
            ok_reply(1..=8),
            Err(LlmError::Network("connection reset".into())),
            ok_reply(1..=1),
        ]);

        let output = BatchAnnotator::new(&model, &profile).annotate(&input).await;

        assert_shape(&input, &output);
        assert!(output[..8].iter().all(|line| line.content_zh == "译"));
        assert!(output[8..16].iter().all(AnnotatedLine::is_placeholder));
        assert_eq!(output[16].content_zh, "译");
        assert_eq!(output[10], AnnotatedLine::placeholder(11, &input[10]));
    }

    #[tokio::test]
    async fn test_every_chunk_failing_across_chunk_sizes() {
        let profile = ModelProfile::lyric_parsing_default();
        for size in [1, 3, 8, 20] {
            for n in [0, 1, 7, 8, 9, 17] {
                let input = lines(n);
                let model = ScriptedModel::from_fn(|_| Err(LlmError::Api(500, "down".into())));
                let output = BatchAnnotator::new(&model, &profile)
                    .with_chunk_size(size)
                    .annotate(&input)
                    .await;

                assert_shape(&input, &output);
                for (i, line) in output.iter().enumerate() {
                    assert_eq!(*line, AnnotatedLine::placeholder(i as u32 + 1, &input[i]));
                }
                assert_eq!(
                    model.requests().await.len(),
                    n.div_ceil(size),
                    "chunk size {}, {} lines",
                    size,
                    n
                );
            }
        }
    }

    #[tokio::test]
    async fn test_unparseable_reply_becomes_placeholders() {
        let profile = ModelProfile::lyric_parsing_default();
        let input = lines(3);
        let model = ScriptedModel::new(vec![Ok("Sorry, I cannot help with that.".to_string())]);

        let output = BatchAnnotator::new(&model, &profile).annotate(&input).await;

        assert_shape(&input, &output);
        assert!(output.iter().all(AnnotatedLine::is_placeholder));
        assert_eq!(output[2].content_ja, "歌詞3行目");
        assert!(output[2].tokens.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_becomes_placeholders() {
        let profile = ModelProfile::lyric_parsing_default();
        let input = lines(2);
        let model = ScriptedModel::new(vec![Ok(r#"{"result": "ok"}"#.to_string())]);

        let output = BatchAnnotator::new(&model, &profile).annotate(&input).await;
        assert!(output.iter().all(AnnotatedLine::is_placeholder));
    }

    #[test]
    fn test_global_line_numbers_are_accepted() {
        let chunk: Vec<String> = vec!["九".into(), "十".into()];
        let entries = vec![
            json!({"lineNumber": 10, "contentZh": "十"}),
            json!({"lineNumber": 9, "contentZh": "九"}),
        ];
        let output = assemble_chunk(&chunk, 8, &entries);
        assert_eq!(output[0].line_number, 9);
        assert_eq!(output[0].content_zh, "九");
        assert_eq!(output[1].line_number, 10);
        assert_eq!(output[1].content_zh, "十");
    }

    #[test]
    fn test_entries_without_numbers_match_by_position() {
        let chunk: Vec<String> = vec!["一".into(), "二".into()];
        let entries = vec![json!({"contentZh": "一"}), json!({"contentZh": "二"})];
        let output = assemble_chunk(&chunk, 0, &entries);
        assert_eq!(output[1].content_zh, "二");
    }

    #[test]
    fn test_model_text_never_replaces_original() {
        let chunk: Vec<String> = vec!["君の夢".into()];
        let entries = vec![json!({
            "lineNumber": 1,
            "contentJa": "きみのゆめ",
            "contentZh": "你的梦",
            "furigana": [{"word": "夢", "reading": "ゆめ", "start": 9, "end": 10}],
        })];
        let output = assemble_chunk(&chunk, 0, &entries);
        assert_eq!(output[0].content_ja, "君の夢");
        assert_eq!((output[0].furigana[0].start, output[0].furigana[0].end), (2, 3));
    }

    #[test]
    fn test_short_reply_fills_missing_lines() {
        let chunk: Vec<String> = vec!["一".into(), "二".into(), "三".into()];
        let entries = vec![json!({"lineNumber": 2, "contentZh": "二"})];
        let output = assemble_chunk(&chunk, 0, &entries);
        assert!(output[0].is_placeholder());
        assert_eq!(output[1].content_zh, "二");
        assert!(output[2].is_placeholder());
    }

    #[test]
    fn test_string_tokens_are_accepted() {
        let chunk: Vec<String> = vec!["君の夢".into()];
        let entries = vec![json!({"lineNumber": 1, "contentZh": "你的梦", "tokens": ["君", "の", "夢"]})];
        let output = assemble_chunk(&chunk, 0, &entries);
        assert_eq!(output[0].tokens.len(), 3);
        assert_eq!(output[0].tokens[2].surface, "夢");
    }
}
