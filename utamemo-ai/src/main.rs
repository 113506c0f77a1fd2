//! utamemo-ai - Japanese song study service
//!
//! Imports lyrics, annotates them with furigana, translations and tokens
//! through a language model, generates vocabulary cards and tracks study
//! progress per user. Default port: 5730.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use utamemo_ai::AppState;
use utamemo_common::config::{self, RootFolderResolver};

/// Command-line arguments for utamemo-ai
#[derive(Parser, Debug)]
#[command(name = "utamemo-ai")]
#[command(about = "Japanese song study service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "UTAMEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long, env = "UTAMEMO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "UTAMEMO_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides TOML)
    #[arg(short, long, env = "UTAMEMO_BIND_ADDRESS")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Load config, then logging as configured there
    let config_path = config::resolve_config_path(args.config.as_deref());
    let toml_config = config::load_toml_config(config_path.as_deref())?;
    utamemo_common::logging::init_logging(&toml_config.logging)?;

    info!("Starting utamemo-ai");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Resolve root folder and open the database
    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &toml_config).resolve();
    let db_path = config::prepare_root_folder(&root_folder)?;
    info!("Database: {}", db_path.display());

    let db_pool = utamemo_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    // Step 3: Pick the language model
    let api_key = utamemo_ai::config::resolve_llm_api_key(&db_pool, &toml_config).await?;
    let (model, mock_mode) = utamemo_ai::config::build_language_model(&toml_config.llm, api_key)?;
    if mock_mode {
        warn!("Language model requests are answered by the offline mock");
    }

    let state = AppState::new(db_pool, model, toml_config.llm.clone(), mock_mode)
        .with_config_path(config_path);
    let app = utamemo_ai::build_router(state);

    // Step 4: Serve
    let bind_address = args.bind_address.unwrap_or(toml_config.bind_address);
    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
