//! In-process job queue
//!
//! Entries are kept in their wire encoding so the in-memory backend decodes
//! exactly like the SQLite one (including malformed entries pushed raw).

use super::JobQueue;
use crate::error::QueueError;
use crate::job::JobDescriptor;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Default)]
pub struct MemoryJobQueue {
    entries: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an already-encoded payload (producers outside this crate)
    pub async fn enqueue_raw(&self, payload: impl Into<String>) {
        self.entries.lock().await.push_back(payload.into());
        self.notify.notify_one();
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let payload = job.to_wire()?;
        self.enqueue_raw(payload).await;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobDescriptor>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            let popped = self.entries.lock().await.pop_front();
            if let Some(payload) = popped {
                return JobDescriptor::from_wire(&payload).map(Some);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.entries.lock().await.len())
    }
}
