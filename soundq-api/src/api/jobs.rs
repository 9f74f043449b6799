//! Job submission and result polling
//!
//! `POST /queue` stores the uploaded file as `<jobs_dir>/<job_id>_<name>`
//! and enqueues a descriptor pointing at it. The worker deletes the file once
//! the job's result is stored.
//!
//! `GET /result/:job_id` returns `{"status": "pending"}` until a result
//! exists, then the stored record unchanged.

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use soundq_common::{JobDescriptor, PollStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field carrying the audio file
pub const UPLOAD_FIELD: &str = "file";

const FALLBACK_FILENAME: &str = "upload";

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub message: String,
    pub job_id: String,
}

/// POST /queue
pub async fn queue_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<QueueResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let job_id = Uuid::new_v4().to_string();
        tokio::fs::create_dir_all(&state.jobs_dir).await?;
        let path = state.jobs_dir.join(format!("{}_{}", job_id, filename));
        tokio::fs::write(&path, &data).await?;

        let job = JobDescriptor::with_id(job_id.clone(), &path, Some(filename));
        if let Err(e) = state.queue.enqueue(&job).await {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }

        info!(
            job_id = %job_id,
            file = %job.display_name(),
            bytes = data.len(),
            "Job queued"
        );

        return Ok(Json(QueueResponse {
            message: "Job queued".to_string(),
            job_id,
        }));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

/// GET /result/:job_id
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PollStatus>> {
    let status = state.store.poll(&job_id).await?;
    tracing::debug!(job_id = %job_id, status = status.status_str(), "Result polled");
    Ok(Json(status))
}

/// Reduce a client-supplied filename to a safe single path component
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/queue", post(queue_job))
        .route("/result/:job_id", get(get_result))
}
