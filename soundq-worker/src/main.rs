//! soundq-worker - Audio classification worker
//!
//! Consumes job descriptors from the shared queue, classifies each uploaded
//! artifact, stores the job result and deletes the artifact.
//!
//! `soundq-worker classify <file>` runs the same pipeline on one local file
//! and prints the job result record, without touching queue or store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use soundq_common::config::{ensure_directory_exists, resolve_root_folder, LoadedConfig};
use soundq_common::db::init_database_pool;
use soundq_common::logging::init_tracing;
use soundq_common::queue::SqliteJobQueue;
use soundq_common::store::SqliteResultStore;
use soundq_common::{JobQueue, JobResult, ResultStore};
use soundq_worker::worker::run_workers;
use soundq_worker::{
    InferenceAssets, InferencePipeline, MidTermExtractor, WorkerConfig, WorkerSettings,
    CONFIG_SECTION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "soundq-worker")]
#[command(about = "Audio classification worker for SoundQ")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "SOUNDQ_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for database, uploads and model files
    #[arg(short, long, env = "SOUNDQ_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Number of worker loops (overrides worker.concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process jobs from the queue until interrupted (default)
    Run,
    /// Classify a single audio file and print the result
    Classify {
        /// Audio file to classify
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = LoadedConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.toml.logging, &["soundq_worker", "soundq_common"])
        .context("Failed to initialize logging")?;

    info!("Starting soundq-worker");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(source) = &config.source {
        info!("Config: {}", source.display());
    }

    let mut worker_config: WorkerConfig = config
        .section(CONFIG_SECTION)
        .context("Failed to read [worker] configuration")?;
    if let Some(concurrency) = args.concurrency {
        worker_config.concurrency = concurrency;
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config.toml);
    info!("Root folder: {}", root_folder.display());

    // Assets are loaded before anything touches the queue: a bad model or
    // mean vector stops the worker here.
    let assets = InferenceAssets::load(&worker_config, &root_folder)
        .context("Failed to load inference assets")?;
    let extractor = MidTermExtractor::new(worker_config.extraction.clone());
    let pipeline = Arc::new(InferencePipeline::new(Arc::new(assets), Arc::new(extractor)));

    match args.command.unwrap_or(Command::Run) {
        Command::Classify { file } => classify_one(pipeline, file).await,
        Command::Run => run(config, worker_config, root_folder, pipeline).await,
    }
}

async fn classify_one(pipeline: Arc<InferencePipeline>, file: PathBuf) -> Result<()> {
    let job_id = file.display().to_string();
    let result = tokio::task::spawn_blocking(move || pipeline.run(&job_id, &file))
        .await
        .context("Classification task failed")?;

    let record = match result {
        Ok(classification) => JobResult::from(classification),
        Err(e) => JobResult::error(e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn run(
    config: LoadedConfig,
    worker_config: WorkerConfig,
    root_folder: PathBuf,
    pipeline: Arc<InferencePipeline>,
) -> Result<()> {
    ensure_directory_exists(&root_folder).context("Failed to initialize root folder")?;

    let db_path = config.toml.database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let queue: Arc<dyn JobQueue> = Arc::new(
        SqliteJobQueue::new(pool.clone())
            .with_name(config.toml.queue.name.clone())
            .with_poll_interval(Duration::from_millis(config.toml.queue.poll_interval_ms)),
    );
    let store: Arc<dyn ResultStore> = Arc::new(SqliteResultStore::new(pool));

    info!(
        queue = %config.toml.queue.name,
        concurrency = worker_config.concurrency,
        "Waiting for jobs"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    run_workers(
        worker_config.concurrency,
        queue,
        store,
        pipeline,
        WorkerSettings::from(&worker_config),
        shutdown,
    )
    .await;

    info!("Worker shutdown complete");
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
            info!("Received Ctrl+C, finishing current jobs");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing current jobs");
        },
    }
}
