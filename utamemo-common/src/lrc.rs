//! LRC timestamp parsing for imported lyrics
//!
//! Lines may be plain text or prefixed with `[mm:ss.xx]` tags. Timed lines
//! end where the next timed line starts; the last one ends at the song
//! duration when it is known.

/// Lyric line with optional playback range in milliseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLine {
    pub text: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

/// Strip LRC tags, drop blank and metadata-only lines, fill in end times
pub fn parse_lyrics<S: AsRef<str>>(raw_lines: &[S], duration_ms: Option<i64>) -> Vec<TimedLine> {
    let mut lines: Vec<TimedLine> = raw_lines
        .iter()
        .filter_map(|raw| parse_line(raw.as_ref()))
        .collect();

    for i in 0..lines.len() {
        let Some(start) = lines[i].start_ms else {
            continue;
        };
        let next_start = lines[i + 1..].iter().find_map(|l| l.start_ms).or(duration_ms);
        lines[i].end_ms = next_start.filter(|end| *end >= start);
    }

    lines
}

fn parse_line(raw: &str) -> Option<TimedLine> {
    let mut rest = raw.trim();
    let mut start_ms = None;

    // Consume leading [..] tags; keep the first timestamp
    while rest.starts_with('[') {
        let Some(close) = rest.find(']') else {
            break;
        };
        let tag = &rest[1..close];
        if let Some(ms) = parse_timestamp(tag) {
            start_ms.get_or_insert(ms);
        } else if start_ms.is_none() && !is_metadata_tag(tag) {
            // Bracketed lyric text, not a tag
            break;
        }
        rest = rest[close + 1..].trim_start();
    }

    let text = rest.trim();
    if text.is_empty() {
        return None;
    }

    Some(TimedLine {
        text: text.to_string(),
        start_ms,
        end_ms: None,
    })
}

/// `mm:ss`, `mm:ss.xx` or `mm:ss.xxx`
fn parse_timestamp(tag: &str) -> Option<i64> {
    let (minutes, seconds) = tag.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(i64::from(minutes) * 60_000 + (seconds * 1000.0).round() as i64)
}

/// `[ar:Artist]`, `[ti:Title]`, `[offset:+100]`, ...
fn is_metadata_tag(tag: &str) -> bool {
    tag.split_once(':')
        .map(|(key, _)| !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false)
}
