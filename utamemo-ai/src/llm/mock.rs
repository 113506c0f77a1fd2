//! Offline language model
//!
//! Used when no API key is configured or `llm.mock_mode` is set. Replies
//! are built from a small fixed vocabulary: words found in the prompted
//! text get furigana and cards, remaining card slots are filled at random.

use super::{CompletionRequest, LanguageModel, LlmError, LlmTask};
use crate::services::json_extract::extract_json;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use utamemo_common::models::{char_len, find_char_offset};

struct MockWord {
    word: &'static str,
    reading: &'static str,
    meaning: &'static str,
    part_of_speech: &'static str,
}

const fn w(
    word: &'static str,
    reading: &'static str,
    meaning: &'static str,
    part_of_speech: &'static str,
) -> MockWord {
    MockWord {
        word,
        reading,
        meaning,
        part_of_speech,
    }
}

const VOCABULARY: &[MockWord] = &[
    w("明日", "あした", "明天", "noun"),
    w("今日", "きょう", "今天", "noun"),
    w("歌う", "うたう", "唱歌", "verb"),
    w("走る", "はしる", "奔跑", "verb"),
    w("美しい", "うつくしい", "美丽的", "adjective"),
    w("優しい", "やさしい", "温柔的", "adjective"),
    w("もっと", "もっと", "更加", "adverb"),
    w("ずっと", "ずっと", "一直", "adverb"),
    w("夢", "ゆめ", "梦", "noun"),
    w("空", "そら", "天空", "noun"),
    w("君", "きみ", "你", "pronoun"),
    w("心", "こころ", "心", "noun"),
    w("花", "はな", "花", "noun"),
    w("涙", "なみだ", "眼泪", "noun"),
    w("愛", "あい", "爱", "noun"),
    w("星", "ほし", "星星", "noun"),
    w("夜", "よる", "夜晚", "noun"),
    w("光", "ひかり", "光", "noun"),
];

/// Deterministic-shape model that needs no network
pub struct MockLanguageModel {
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl MockLanguageModel {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible card fill order
    pub fn with_seed(delay_ms: u64, seed: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn annotate_reply(&self, payload: &Value) -> String {
        let lines: Vec<Value> = payload["lines"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|line| {
                let text = line["text"].as_str().unwrap_or_default();
                let found = vocabulary_in(text);
                json!({
                    "lineNumber": line["lineNumber"],
                    "contentJa": text,
                    "contentZh": format!("[模拟翻译] {}", text),
                    "furigana": found
                        .iter()
                        .filter(|(entry, _)| entry.word != entry.reading)
                        .map(|(entry, start)| json!({
                            "word": entry.word,
                            "reading": entry.reading,
                            "start": start,
                            "end": start + char_len(entry.word),
                        }))
                        .collect::<Vec<_>>(),
                    "tokens": found
                        .iter()
                        .map(|(entry, _)| json!({
                            "surface": entry.word,
                            "reading": entry.reading,
                            "partOfSpeech": entry.part_of_speech,
                        }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();

        format!("Here are the annotated lyrics:\n{}", json!({ "lines": lines }))
    }

    fn cards_reply(&self, payload: &Value) -> String {
        let text = payload["line"]["contentJa"].as_str().unwrap_or_default();
        let count = payload["count"].as_u64().unwrap_or(1).clamp(1, 5) as usize;

        let found = vocabulary_in(text);
        let mut cards: Vec<Value> = found
            .iter()
            .take(count)
            .map(|(entry, start)| card_json(entry, Some(*start)))
            .collect();

        if cards.len() < count {
            let mut rest: Vec<&MockWord> = VOCABULARY
                .iter()
                .filter(|entry| !found.iter().any(|(f, _)| f.word == entry.word))
                .collect();
            match self.rng.lock() {
                Ok(mut rng) => rest.shuffle(&mut *rng),
                Err(poisoned) => rest.shuffle(&mut *poisoned.into_inner()),
            }
            cards.extend(rest.into_iter().take(count - cards.len()).map(|entry| card_json(entry, None)));
        }

        json!({ "cards": cards }).to_string()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let payload = extract_json(&request.user).unwrap_or_else(|| json!({}));
        let reply = match request.task {
            LlmTask::LyricParsing => self.annotate_reply(&payload),
            LlmTask::CardGeneration => self.cards_reply(&payload),
        };

        tracing::debug!(task = request.task.as_str(), reply_chars = reply.chars().count(), "Mock completion");
        Ok(reply)
    }
}

/// Vocabulary occurrences in `text`, longest words first, without overlaps,
/// ordered by position
fn vocabulary_in(text: &str) -> Vec<(&'static MockWord, usize)> {
    let mut taken: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(&'static MockWord, usize)> = Vec::new();

    let mut by_length: Vec<&'static MockWord> = VOCABULARY.iter().collect();
    by_length.sort_by_key(|entry| std::cmp::Reverse(char_len(entry.word)));

    for entry in by_length {
        let len = char_len(entry.word);
        let mut from = 0;
        while let Some(start) = find_char_offset(text, entry.word, from) {
            let end = start + len;
            if !taken.iter().any(|&(s, e)| start < e && s < end) {
                taken.push((start, end));
                found.push((entry, start));
            }
            from = end;
        }
    }

    found.sort_by_key(|&(_, start)| start);
    found
}

fn card_json(entry: &MockWord, start: Option<usize>) -> Value {
    json!({
        "word": entry.word,
        "reading": entry.reading,
        "meaning": entry.meaning,
        "partOfSpeech": entry.part_of_speech,
        "wordPosition": start.map(|s| json!({"start": s, "end": s + char_len(entry.word)})),
    })
}
