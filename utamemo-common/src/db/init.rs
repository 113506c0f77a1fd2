//! Database initialization
//!
//! Opens (or creates) the SQLite database in the root folder and creates
//! every table idempotently. Ownership is expressed with cascading foreign
//! keys: songs → lines → cards → card_progress.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// The connection is never recycled, so the database lives as long as the pool.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_songs_table(pool).await?;
    create_lines_table(pool).await?;
    create_cards_table(pool).await?;
    create_card_progress_table(pool).await?;
    create_conversations_table(pool).await?;
    create_messages_table(pool).await?;

    info!("Database schema ready (settings, songs, lines, cards, card_progress, conversations, messages)");
    Ok(())
}

/// Key-value runtime settings
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL DEFAULT '',
            duration_ms INTEGER,
            cover_url TEXT,
            source TEXT NOT NULL DEFAULT 'local' CHECK (source IN ('local', 'platform')),
            source_ref TEXT,
            is_public INTEGER NOT NULL DEFAULT 0,
            user_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_user ON songs(user_id)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_lines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lines (
            id TEXT PRIMARY KEY,
            song_id TEXT NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
            line_number INTEGER NOT NULL,
            content_ja TEXT NOT NULL,
            content_zh TEXT,
            furigana TEXT NOT NULL DEFAULT '[]',
            tokens TEXT NOT NULL DEFAULT '[]',
            start_ms INTEGER,
            end_ms INTEGER,
            UNIQUE (song_id, line_number),
            CHECK (start_ms IS NULL OR end_ms IS NULL OR start_ms <= end_ms)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lines_song ON lines(song_id)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_cards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            line_id TEXT NOT NULL REFERENCES lines(id) ON DELETE CASCADE,
            word TEXT NOT NULL,
            reading TEXT NOT NULL DEFAULT '',
            meaning TEXT NOT NULL DEFAULT '',
            part_of_speech TEXT NOT NULL DEFAULT 'other'
                CHECK (part_of_speech IN ('noun', 'verb', 'adjective', 'adverb', 'particle', 'other')),
            example TEXT,
            example_translation TEXT,
            word_start INTEGER,
            word_end INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_line ON cards(line_id)")
        .execute(pool)
        .await?;
    Ok(())
}

/// One row per (user, card)
pub async fn create_card_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_progress (
            user_id TEXT NOT NULL,
            card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'new' CHECK (status IN ('new', 'learning', 'mastered')),
            review_count INTEGER NOT NULL DEFAULT 0,
            last_reviewed_at TEXT,
            PRIMARY KEY (user_id, card_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_conversations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            song_id TEXT REFERENCES songs(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (conversation_id, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
