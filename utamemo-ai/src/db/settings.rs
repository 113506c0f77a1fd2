//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use sqlx::{Pool, Sqlite};
use utamemo_common::{Error, Result};

const LLM_API_KEY: &str = "llm_api_key";

/// Language model API key stored at runtime, if any
pub async fn get_llm_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, LLM_API_KEY).await
}

pub async fn set_llm_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, LLM_API_KEY, key).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
