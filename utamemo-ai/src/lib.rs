//! utamemo-ai library interface
//!
//! Lyric import with AI annotation, vocabulary card generation, and study
//! progress tracking over HTTP. Exposed as a library for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use llm::LanguageModel;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utamemo_common::config::LlmConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Language model used for annotation and cards
    pub model: Arc<dyn LanguageModel>,
    /// Endpoint, profiles and chunking for the pipeline
    pub llm: Arc<LlmConfig>,
    /// True when `model` is the offline mock
    pub mock_mode: bool,
    /// TOML file that settings are synced back to, when known
    pub config_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, model: Arc<dyn LanguageModel>, llm: LlmConfig, mock_mode: bool) -> Self {
        Self {
            db,
            model,
            llm: Arc::new(llm),
            mock_mode,
            config_path: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::song_routes())
        .merge(api::card_routes())
        .merge(api::study_routes())
        .merge(api::conversation_routes())
        .merge(api::settings_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
