//! Job queue
//!
//! Ordered, blocking hand-off of [`JobDescriptor`]s from producers (the
//! submitter) to consumers (worker loops).
//!
//! **Direction:** FIFO. The oldest entry is delivered first, in every backend.
//!
//! **Delivery:** each entry is popped atomically, so it reaches exactly one
//! consumer even when several workers share the queue. A consumer that crashes
//! after the pop loses that job; there is no redelivery.
//!
//! **Waiting:** [`JobQueue::dequeue`] blocks for at most `timeout`. Running out
//! of time with no work is `Ok(None)`, the normal idle signal.

mod memory;
mod sqlite;

pub use memory::MemoryJobQueue;
pub use sqlite::SqliteJobQueue;

use crate::error::QueueError;
use crate::job::JobDescriptor;
use async_trait::async_trait;
use std::time::Duration;

/// Default queue name (the list the submitter pushes to)
pub const DEFAULT_QUEUE_NAME: &str = "audio_jobs";

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a descriptor at the tail
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError>;

    /// Pop the head, waiting up to `timeout` for one to arrive
    ///
    /// # Errors
    /// - `QueueError::Malformed` when the popped entry does not decode; the
    ///   entry is consumed regardless
    /// - `QueueError::Backend` on storage failure
    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobDescriptor>, QueueError>;

    /// Number of entries waiting
    async fn len(&self) -> Result<usize, QueueError>;
}
