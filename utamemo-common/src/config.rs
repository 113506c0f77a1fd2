//! Configuration loading and root folder resolution
//!
//! Two tiers, as for every utamemo service:
//! 1. **TOML bootstrap**: root folder, port, logging, language model settings
//! 2. **Database runtime**: values written through the settings API (`settings` table)
//!
//! Every TOML field has a built-in default; a missing file is a warning, not an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "UTAMEMO_CONFIG";
/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "UTAMEMO_ROOT_FOLDER";
/// Environment variable carrying the language model API key
pub const LLM_API_KEY_ENV_VAR: &str = "UTAMEMO_LLM_API_KEY";
/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "utamemo.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database (optional, see [`RootFolderResolver`])
    pub root_folder: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "127.0.0.1".to_string(),
            port: 5730,
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Model name, temperature and output budget for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelProfile {
    pub fn lyric_parsing_default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 4000,
        }
    }

    pub fn card_generation_default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Retry behaviour around language model calls. Zero retries by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

/// Language model endpoint and pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API root (`/chat/completions` is appended)
    pub base_url: String,
    pub api_key: Option<String>,
    /// Force the mock model even when a key is configured
    pub mock_mode: bool,
    /// Synthetic latency of the mock model
    pub mock_delay_ms: u64,
    /// Lyric lines per annotation request
    pub chunk_size: usize,
    /// Minimum spacing between two requests (0 = no limit)
    pub min_interval_ms: u64,
    /// Request timeout; the HTTP client default applies when unset
    pub request_timeout_secs: Option<u64>,
    pub retry: RetryConfig,
    pub lyric_parsing: ModelProfile,
    pub card_generation: ModelProfile,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            mock_mode: false,
            mock_delay_ms: 400,
            chunk_size: 8,
            min_interval_ms: 0,
            request_timeout_secs: None,
            retry: RetryConfig::default(),
            lyric_parsing: ModelProfile::lyric_parsing_default(),
            card_generation: ModelProfile::card_generation_default(),
        }
    }
}

/// Locate the TOML config file
///
/// Priority: command-line argument → `UTAMEMO_CONFIG` → `<config_dir>/utamemo/utamemo.toml`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("utamemo").join("utamemo.toml"))
}

/// Load TOML config, falling back to defaults when the file is missing
///
/// A file that exists but does not parse is an error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file location available, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file not found: {}, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution
///
/// Priority:
/// 1. Command-line argument (highest priority)
/// 2. `UTAMEMO_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default (fallback)
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("utamemo"))
        .unwrap_or_else(|| PathBuf::from("./utamemo_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder).map_err(|e| {
        Error::Config(format!(
            "Failed to create root folder {}: {}",
            root_folder.display(),
            e
        ))
    })?;
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
