//! Database access for utamemo-ai
//!
//! Schema creation lives in `utamemo_common::db`. Ids are stored as TEXT,
//! timestamps as RFC 3339 TEXT, furigana and tokens as JSON TEXT.

pub mod cards;
pub mod conversations;
pub mod lines;
pub mod progress;
pub mod settings;
pub mod songs;

use chrono::{DateTime, Utc};
use utamemo_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&format_timestamp(&now)).unwrap(), now);
    }

    #[test]
    fn test_invalid_values_are_internal_errors() {
        assert!(matches!(parse_uuid("not-a-uuid"), Err(Error::Internal(_))));
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Internal(_))));
    }
}
