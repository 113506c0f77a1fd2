//! Configuration resolution for utamemo-ai
//!
//! Language model API key priority: Database → ENV → TOML. With no key the
//! service runs against the offline mock model.

use crate::llm::{HttpLanguageModel, LanguageModel, MockLanguageModel};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use utamemo_common::config::{LlmConfig, TomlConfig, LLM_API_KEY_ENV_VAR};
use utamemo_common::{Error, Result};

/// Resolve the language model API key, `None` when no source has one
pub async fn resolve_llm_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_llm_api_key(db).await?;
    let env_key = std::env::var(LLM_API_KEY_ENV_VAR).ok();
    let toml_key = toml_config.llm.api_key.clone();

    Ok(pick_api_key(db_key, env_key, toml_key))
}

fn pick_api_key(db_key: Option<String>, env_key: Option<String>, toml_key: Option<String>) -> Option<String> {
    let candidates = [("database", db_key), ("environment", env_key), ("TOML", toml_key)];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "LLM API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    candidates
        .into_iter()
        .find_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .map(|(source, key)| {
            info!("LLM API key loaded from {}", source);
            key
        })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick the model implementation for this process.
///
/// Returns the model and whether it is the mock.
pub fn build_language_model(llm: &LlmConfig, api_key: Option<String>) -> Result<(Arc<dyn LanguageModel>, bool)> {
    if llm.mock_mode {
        info!("Mock mode enabled in configuration, language model requests stay offline");
        return Ok((Arc::new(MockLanguageModel::new(llm.mock_delay_ms)), true));
    }

    match api_key {
        Some(key) => {
            let model = HttpLanguageModel::new(llm, key)
                .map_err(|e| Error::Config(format!("Language model client setup failed: {}", e)))?;
            info!(endpoint = model.endpoint(), "Using HTTP language model");
            Ok((Arc::new(model), false))
        }
        None => {
            warn!(
                "No LLM API key configured ({} / settings / TOML); running in mock mode",
                LLM_API_KEY_ENV_VAR
            );
            Ok((Arc::new(MockLanguageModel::new(llm.mock_delay_ms)), true))
        }
    }
}

/// Write settings back into the TOML file (best-effort)
///
/// HashMap keys: "llm_api_key"
pub fn sync_settings_to_toml(settings: HashMap<String, String>, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
    } else {
        TomlConfig::default()
    };

    if let Some(key) = settings.get("llm_api_key") {
        config.llm.api_key = Some(key.clone());
    }

    match utamemo_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(())
        }
    }
}
