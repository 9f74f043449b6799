//! soundq-api library interface
//!
//! HTTP front end that accepts audio uploads, queues them for the worker and
//! serves job results. Exposed as a library for integration testing.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use soundq_common::{JobQueue, ResultStore};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default request body limit when none is configured
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn ResultStore>,
    /// Where uploads are written before the worker picks them up
    pub jobs_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ResultStore>, jobs_dir: PathBuf) -> Self {
        Self {
            queue,
            store,
            jobs_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            startup_time: Utc::now(),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
