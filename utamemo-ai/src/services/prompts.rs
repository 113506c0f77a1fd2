//! Prompt construction for lyric annotation and card generation
//!
//! The user prompt opens with the input serialized as a JSON object so the
//! first `{` of the prompt is always the payload. Reply shapes live in the
//! system prompt.

use crate::services::card_generator::LineContext;
use serde_json::json;

/// System + user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const LYRIC_PARSING_SYSTEM: &str = r#"You annotate Japanese song lyrics for Chinese-speaking learners.

For every input line:
1. Copy the line text unchanged into "contentJa" and keep its "lineNumber".
2. Translate the line into natural Simplified Chinese ("contentZh").
3. For every word written with kanji, add a furigana entry: the word exactly as it appears in the line, its reading in hiragana, and its position as character offsets into the line ("start" inclusive, "end" exclusive, counting from 0).
4. Split the line into tokens with surface form, hiragana reading and part of speech.

Return exactly one entry per input line. Reply with a single JSON object and nothing else:
{"lines":[{"lineNumber":1,"contentJa":"...","contentZh":"...","furigana":[{"word":"...","reading":"...","start":0,"end":1}],"tokens":[{"surface":"...","reading":"...","partOfSpeech":"noun"}]}]}"#;

const CARD_GENERATION_SYSTEM: &str = r#"You create vocabulary flashcards from one line of Japanese song lyrics for Chinese-speaking learners.

Choose the most useful words of the line for a learner, most useful first. Prefer content words (nouns, verbs, adjectives, adverbs) over particles. Each card holds:
- "word": the word exactly as written in the line
- "reading": its reading in hiragana
- "meaning": a short Simplified Chinese meaning
- "partOfSpeech": one of noun, verb, adjective, adverb, particle, other
- "wordPosition": {"start":..,"end":..} character offsets of the word in the line (end exclusive)

Reply with a single JSON object and nothing else:
{"cards":[{"word":"...","reading":"...","meaning":"...","partOfSpeech":"noun","wordPosition":{"start":0,"end":1}}]}"#;

/// Prompt asking for annotation of `lines`, numbered from 1 within the batch
pub fn lyric_parse_prompt(lines: &[String]) -> Prompt {
    let payload = json!({
        "lines": lines
            .iter()
            .enumerate()
            .map(|(index, text)| json!({ "lineNumber": index + 1, "text": text }))
            .collect::<Vec<_>>(),
    });

    let instruction = if lines.is_empty() {
        "The batch is empty. Reply with an empty \"lines\" array.".to_string()
    } else {
        format!(
            "Annotate all {} lines above. Reply with {} entries in \"lines\".",
            lines.len(),
            lines.len()
        )
    };

    Prompt {
        system: LYRIC_PARSING_SYSTEM.to_string(),
        user: format!("{}\n\n{}", payload, instruction),
    }
}

/// Prompt asking for `count` vocabulary cards from one line
pub fn card_prompt(line: &LineContext, count: usize) -> Prompt {
    let payload = json!({
        "line": line,
        "count": count,
    });

    Prompt {
        system: CARD_GENERATION_SYSTEM.to_string(),
        user: format!(
            "{}\n\nCreate exactly {} card{} for the line above.",
            payload,
            count,
            if count == 1 { "" } else { "s" }
        ),
    }
}
