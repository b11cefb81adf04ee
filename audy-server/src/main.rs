//! audy-server - self-hosted audio library server
//!
//! Serves the live event channels, track ingestion, remote import queue and
//! range streaming over HTTP.

use anyhow::{Context, Result};
use audy_common::config::{default_config_path, load_toml_config, RootFolderResolver};
use audy_server::services::LibraryStore;
use audy_server::AppState;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for audy-server
#[derive(Parser, Debug)]
#[command(name = "audy-server")]
#[command(about = "Self-hosted audio library server")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "AUDY_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(long, env = "AUDY_BIND")]
    bind: Option<String>,

    /// Root folder holding storage.db, music/ and upload/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load config")?,
        None => Default::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("audy_server={0},audy_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audy-server v{}", env!("CARGO_PKG_VERSION"));

    // Root folder: CLI > AUDY_ROOT_FOLDER > TOML > platform default
    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &config).resolve();
    info!("Root folder: {}", root_folder.display());

    let library = LibraryStore::new(&root_folder);
    library
        .ensure_layout()
        .with_context(|| format!("Failed to initialize {}", root_folder.display()))?;

    let db_path = library.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = audy_server::db::init_database_pool(&db_path).await?;

    let state = AppState::new(db_pool, library.clone(), config.library.clone());

    let report = library
        .reconcile(state.catalog.as_ref())
        .await
        .context("Library reconciliation failed")?;
    info!(
        "Library ready ({} stale rows, {} orphan entries removed)",
        report.missing_files, report.orphan_dirs
    );

    let app = audy_server::build_router(state);

    let port = args.port.unwrap_or(config.port);
    let bind = args.bind.unwrap_or(config.bind);
    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

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
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
