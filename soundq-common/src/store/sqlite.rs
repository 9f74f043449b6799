//! SQLite-backed result store (`job_results` table)

use super::ResultStore;
use crate::error::StoreError;
use crate::job::{result_key, JobResult};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn put(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError> {
        let record = serde_json::to_string(result)?;

        sqlx::query("INSERT OR REPLACE INTO job_results (key, record, stored_at) VALUES (?, ?, ?)")
            .bind(result_key(job_id))
            .bind(&record)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT record FROM job_results WHERE key = ?")
            .bind(result_key(job_id))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((record,)) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }
}
