//! SQLite-backed job queue
//!
//! Entries live in the `job_queue` table, ordered by an autoincrement
//! sequence. A pop is a single `DELETE ... RETURNING` statement, which SQLite
//! executes atomically: two consumers racing for the head never both get it,
//! whether they share this process or not.
//!
//! Waiting combines an in-process [`Notify`] (instant wakeup for producers in
//! the same process) with a poll interval (producers in other processes).

use super::{JobQueue, DEFAULT_QUEUE_NAME};
use crate::error::QueueError;
use crate::job::JobDescriptor;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// Default interval between queue polls while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    queue_name: String,
    poll_interval: Duration,
    notify: Arc<Notify>,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Push an already-encoded payload
    pub async fn enqueue_raw(&self, payload: &str) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO job_queue (queue_name, payload, enqueued_at) VALUES (?, ?, ?)")
            .bind(&self.queue_name)
            .bind(payload)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        self.notify.notify_one();
        Ok(())
    }

    /// Pop the head without waiting
    async fn try_pop(&self) -> Result<Option<String>, QueueError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM job_queue
            WHERE seq = (
                SELECT seq FROM job_queue
                WHERE queue_name = ?
                ORDER BY seq ASC
                LIMIT 1
            )
            RETURNING payload
            "#,
        )
        .bind(&self.queue_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(payload,)| payload))
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let payload = job.to_wire()?;
        self.enqueue_raw(&payload).await?;
        trace!(job_id = %job.job_id, queue = %self.queue_name, "Job enqueued");
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobDescriptor>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(payload) = self.try_pop().await? {
                return JobDescriptor::from_wire(&payload).map(Some);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wait = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_queue WHERE queue_name = ?")
            .bind(&self.queue_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}
