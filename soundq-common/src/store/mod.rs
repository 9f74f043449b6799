//! Result store
//!
//! Keyed storage of job outcomes, written by the worker and read by pollers.
//! Records are stored under [`result_key`](crate::job::result_key)
//! (`"result:" + job_id`). `put` overwrites, so repeating it is harmless.
//!
//! Absence is not an error: [`ResultStore::poll`] reports it as
//! [`PollStatus::Pending`].

mod memory;
mod sqlite;

pub use memory::MemoryResultStore;
pub use sqlite::SqliteResultStore;

use crate::error::StoreError;
use crate::job::{JobResult, PollStatus};
use async_trait::async_trait;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write (or overwrite) the result for `job_id`
    async fn put(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError>;

    /// Stored result for `job_id`, if any
    async fn get(&self, job_id: &str) -> Result<Option<JobResult>, StoreError>;

    /// Poller view: pending until a result exists
    async fn poll(&self, job_id: &str) -> Result<PollStatus, StoreError> {
        Ok(PollStatus::from(self.get(job_id).await?))
    }
}
