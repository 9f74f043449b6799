//! Worker loop
//!
//! Pulls job descriptors from the queue and drives each one to a terminal
//! result:
//!
//! ```text
//! Dequeued → Extracting → Normalizing → Classifying → Persisted → CleanedUp
//! ```
//!
//! A failure in any inference stage becomes an `error` result; the job is
//! never retried or re-enqueued. The result is persisted before the artifact
//! is deleted. If persisting fails the artifact is kept so the job can be
//! submitted again.
//!
//! Shutdown is only observed between dequeue waits: a job that has been
//! popped always reaches a terminal state first.

use crate::config::WorkerConfig;
use crate::error::JobError;
use crate::pipeline::InferencePipeline;
use soundq_common::{JobDescriptor, JobQueue, JobResult, QueueError, ResultStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Dequeued,
    Extracting,
    Normalizing,
    Classifying,
    Persisted,
    CleanedUp,
}

/// Loop timing, taken from `[worker]`
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub dequeue_timeout: Duration,
    pub error_backoff: Duration,
    pub stage_timeout: Option<Duration>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            dequeue_timeout: config.dequeue_timeout(),
            error_backoff: config.error_backoff(),
            stage_timeout: config.stage_timeout(),
        }
    }
}

/// What happened to the input artifact after the result was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    /// Nothing to delete (already gone)
    AlreadyAbsent,
    /// Deletion failed; logged and otherwise ignored
    Failed(String),
    /// Not attempted because the result was not persisted
    Skipped,
}

/// Summary of one processed job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub result: JobResult,
    pub persisted: bool,
    pub cleanup: CleanupOutcome,
}

/// Outcome of one loop iteration
#[derive(Debug)]
pub enum Iteration {
    /// Dequeue timed out with no work
    Idle,
    Processed(JobReport),
    /// Popped entry could not be decoded
    Rejected { job_id: Option<String> },
    /// Queue backend failed; the caller should back off
    QueueUnavailable,
}

pub struct WorkerLoop {
    id: usize,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ResultStore>,
    pipeline: Arc<InferencePipeline>,
    settings: WorkerSettings,
}

impl WorkerLoop {
    pub fn new(
        id: usize,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ResultStore>,
        pipeline: Arc<InferencePipeline>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            queue,
            store,
            pipeline,
            settings,
        }
    }

    /// Process jobs until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(worker = self.id, "Worker loop started");

        while !shutdown.is_cancelled() {
            match self.run_once().await {
                Iteration::Idle => trace!(worker = self.id, "No job available"),
                Iteration::QueueUnavailable => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.error_backoff) => {}
                    }
                }
                Iteration::Processed(_) | Iteration::Rejected { .. } => {}
            }
        }

        info!(worker = self.id, "Worker loop stopped");
    }

    /// Wait for one job (up to the dequeue timeout) and process it
    pub async fn run_once(&self) -> Iteration {
        match self.queue.dequeue(self.settings.dequeue_timeout).await {
            Ok(None) => Iteration::Idle,
            Ok(Some(job)) => Iteration::Processed(self.process(job).await),
            Err(QueueError::Malformed {
                job_id,
                filepath,
                reason,
            }) => {
                warn!(worker = self.id, job_id = ?job_id, reason = %reason, "Discarding malformed queue entry");
                if let Some(id) = &job_id {
                    let result = JobResult::error(format!("Malformed job descriptor: {}", reason));
                    match self.store.put(id, &result).await {
                        Ok(()) => {
                            if let Some(path) = &filepath {
                                let outcome = remove_artifact(path).await;
                                debug!(job_id = %id, cleanup = ?outcome, "Malformed entry artifact handled");
                            }
                        }
                        Err(e) => {
                            error!(worker = self.id, job_id = %id, error = %e, "Failed to store result for malformed entry");
                        }
                    }
                }
                Iteration::Rejected { job_id }
            }
            Err(e) => {
                error!(
                    worker = self.id,
                    error = %e,
                    backoff_ms = self.settings.error_backoff.as_millis() as u64,
                    "Job queue unavailable"
                );
                Iteration::QueueUnavailable
            }
        }
    }

    /// Drive one dequeued job to a terminal state
    pub async fn process(&self, job: JobDescriptor) -> JobReport {
        info!(
            worker = self.id,
            job_id = %job.job_id,
            stage = ?JobStage::Dequeued,
            file = %job.display_name(),
            "Job dequeued"
        );

        let result = match self.infer(&job).await {
            Ok(classification) => {
                info!(
                    job_id = %job.job_id,
                    predicted_class = %classification.label,
                    confidence = classification.confidence,
                    "Job completed"
                );
                JobResult::from(classification)
            }
            Err(e) => {
                warn!(job_id = %job.job_id, error = %e, "Job failed");
                JobResult::error(e.to_string())
            }
        };

        let persisted = match self.store.put(&job.job_id, &result).await {
            Ok(()) => {
                debug!(job_id = %job.job_id, stage = ?JobStage::Persisted, status = result.status_str(), "Job advancing");
                true
            }
            Err(e) => {
                error!(
                    job_id = %job.job_id,
                    error = %e,
                    path = %job.path().display(),
                    "Failed to persist job result; keeping artifact for resubmission"
                );
                false
            }
        };

        let cleanup = if persisted {
            let outcome = remove_artifact(job.path()).await;
            debug!(job_id = %job.job_id, stage = ?JobStage::CleanedUp, cleanup = ?outcome, "Job advancing");
            outcome
        } else {
            CleanupOutcome::Skipped
        };

        JobReport {
            job_id: job.job_id,
            result,
            persisted,
            cleanup,
        }
    }

    /// Run the pipeline on the blocking pool, bounded by the stage timeout
    async fn infer(&self, job: &JobDescriptor) -> Result<crate::classifier::Classification, JobError> {
        let pipeline = Arc::clone(&self.pipeline);
        let job_id = job.job_id.clone();
        let path = job.filepath.clone();
        let handle = tokio::task::spawn_blocking(move || pipeline.run(&job_id, &path));

        let joined = match self.settings.stage_timeout {
            // The blocking task cannot be interrupted; it finishes in the
            // background and its output is dropped.
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(JobError::Timeout(limit)),
            },
            None => handle.await,
        };

        joined.map_err(|e| JobError::Internal(format!("inference task failed: {}", e)))?
    }
}

/// Delete the input artifact, best-effort
///
/// A missing file is fine. Other failures are logged at warn and reported,
/// never propagated.
pub async fn remove_artifact(path: &Path) -> CleanupOutcome {
    match tokio::fs::remove_file(path).await {
        Ok(()) => CleanupOutcome::Removed,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Artifact already absent");
            CleanupOutcome::AlreadyAbsent
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to delete artifact");
            CleanupOutcome::Failed(e.to_string())
        }
    }
}

/// Run `concurrency` loops over the same queue, store and assets
///
/// Returns once every loop has stopped after `shutdown` is cancelled.
pub async fn run_workers(
    concurrency: usize,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ResultStore>,
    pipeline: Arc<InferencePipeline>,
    settings: WorkerSettings,
    shutdown: CancellationToken,
) {
    let mut workers = JoinSet::new();

    for id in 0..concurrency.max(1) {
        let worker = WorkerLoop::new(
            id,
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&pipeline),
            settings.clone(),
        );
        let shutdown = shutdown.clone();
        workers.spawn(async move { worker.run(shutdown).await });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Worker loop task ended abnormally");
        }
    }
}
