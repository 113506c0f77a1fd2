//! JSON object extraction from free-form model replies
//!
//! Models wrap their JSON in prose or markdown fences often enough that the
//! reply is never parsed directly. [`extract_json`] tries the whole reply
//! first, then the first balanced `{...}` block.

use serde_json::{Map, Value};

/// Parse the JSON object carried by a model reply.
///
/// Returns `None` when the reply contains no object or the first balanced
/// block is not valid JSON. Later blocks are not attempted.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let candidate = &trimmed[start..];
    let end = balanced_object_end(candidate)?;

    match serde_json::from_str::<Value>(&candidate[..end]) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Balanced block in model reply is not valid JSON");
            None
        }
    }
}

/// Byte offset just past the `}` closing the object that opens `text`.
///
/// Braces inside string literals do not count.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// First `max_chars` characters of a reply, for log lines
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push('…');
    }
    out
}

// ============================================================================
// Lenient field access
// ============================================================================

/// First non-empty string under any of `keys`
pub(crate) fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
}

/// First non-negative integer under any of `keys`. Numeric strings count.
pub(crate) fn usize_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<usize> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(as_usize)
}

pub(crate) fn as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Array elements of `value`, also when the model sent the array as a
/// JSON-encoded string
pub(crate) fn array_items(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
