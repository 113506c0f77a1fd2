//! Alignment of model-reported spans against the original line text
//!
//! Offsets from a model are hints. A span is kept only when it can be tied
//! to an actual occurrence of its word in the line; otherwise the word is
//! searched for, and dropped when absent.

use utamemo_common::models::{char_len, char_slice, find_char_offset, FuriganaSpan, WordSpan};

/// Furigana entry as reported by a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpan {
    pub word: String,
    pub reading: String,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Turn reported spans into spans valid for `text`.
///
/// Result is sorted by start offset and free of overlaps.
pub fn align_furigana(text: &str, raw: Vec<RawSpan>) -> Vec<FuriganaSpan> {
    let mut aligned: Vec<FuriganaSpan> = Vec::with_capacity(raw.len());
    let mut cursor = 0usize;

    for span in raw {
        let word = span.word.trim();
        let reading = span.reading.trim();
        if word.is_empty() || reading.is_empty() {
            continue;
        }

        let Some(position) = locate_word(text, word, span.start.zip(span.end), cursor) else {
            tracing::debug!(word, "Dropping furigana for word not found in line");
            continue;
        };

        cursor = position.end;
        aligned.push(FuriganaSpan {
            word: word.to_string(),
            reading: reading.to_string(),
            start: position.start,
            end: position.end,
        });
    }

    aligned.sort_by_key(|span| (span.start, span.end));
    let mut result: Vec<FuriganaSpan> = Vec::with_capacity(aligned.len());
    for span in aligned {
        if result.last().is_some_and(|prev| span.start < prev.end) {
            continue;
        }
        result.push(span);
    }
    result
}

/// Character span of `word` in `text`.
///
/// A `hint` that already covers `word` wins. Otherwise the first
/// occurrence at or after `from`, then the first occurrence anywhere.
pub fn locate_word(text: &str, word: &str, hint: Option<(usize, usize)>, from: usize) -> Option<WordSpan> {
    if word.is_empty() {
        return None;
    }

    if let Some((start, end)) = hint {
        if start < end && char_slice(text, start, end).as_deref() == Some(word) {
            return Some(WordSpan { start, end });
        }
    }

    let len = char_len(word);
    let start = find_char_offset(text, word, from.min(char_len(text)))
        .or_else(|| find_char_offset(text, word, 0))?;
    Some(WordSpan {
        start,
        end: start + len,
    })
}
