//! # utamemo Common Library
//!
//! Shared code for the utamemo services including:
//! - Domain model (songs, lyric lines, cards, conversations)
//! - Learning state tracking for study sessions
//! - Configuration loading and logging setup
//! - Database initialization
//! - LRC timestamp parsing

pub mod config;
pub mod db;
pub mod error;
pub mod learning;
pub mod logging;
pub mod lrc;
pub mod models;

pub use error::{Error, Result};
pub use learning::{CardProgress, LearningStatus, LearningTracker, ProgressStore};
pub use models::PartOfSpeech;
