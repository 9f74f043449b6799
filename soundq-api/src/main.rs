//! soundq-api - Job submission service
//!
//! Accepts audio uploads on `POST /queue`, pushes a job descriptor onto the
//! shared queue and serves results on `GET /result/:job_id`.

use anyhow::{Context, Result};
use clap::Parser;
use soundq_api::{build_router, AppState};
use soundq_common::config::{
    ensure_directory_exists, resolve_path, resolve_root_folder, LoadedConfig,
};
use soundq_common::db::init_database_pool;
use soundq_common::logging::init_tracing;
use soundq_common::queue::SqliteJobQueue;
use soundq_common::store::SqliteResultStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "soundq-api")]
#[command(about = "Job submission and result polling service for SoundQ")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "SOUNDQ_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for database and uploads
    #[arg(short, long, env = "SOUNDQ_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on (overrides api.bind_address)
    #[arg(short, long, env = "SOUNDQ_BIND_ADDRESS")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = LoadedConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.toml.logging, &["soundq_api", "soundq_common", "tower_http"])
        .context("Failed to initialize logging")?;

    info!("Starting soundq-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config.toml);
    ensure_directory_exists(&root_folder).context("Failed to initialize root folder")?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.toml.database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let jobs_dir = resolve_path(&root_folder, &config.toml.api.jobs_dir);
    ensure_directory_exists(&jobs_dir).context("Failed to create jobs directory")?;
    info!("Uploads: {}", jobs_dir.display());

    let queue = SqliteJobQueue::new(pool.clone()).with_name(config.toml.queue.name.clone());
    let store = SqliteResultStore::new(pool);
    let state = AppState::new(Arc::new(queue), Arc::new(store), jobs_dir)
        .with_max_upload_bytes(config.toml.api.max_upload_bytes);

    let app = build_router(state);

    let bind_address = args
        .bind
        .unwrap_or_else(|| config.toml.api.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
