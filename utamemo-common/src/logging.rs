//! Tracing subscriber setup shared by utamemo binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. When a log file is configured,
/// output is appended to it without ANSI colors instead of going to stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info,sqlx=warn", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}
