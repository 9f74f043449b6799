//! In-process result store

use super::ResultStore;
use crate::error::StoreError;
use crate::job::{result_key, JobResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryResultStore {
    records: RwLock<HashMap<String, JobResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(result_key(job_id), result.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        Ok(self.records.read().await.get(&result_key(job_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PollStatus;

    #[tokio::test]
    async fn test_put_get_and_pending() {
        let store = MemoryResultStore::new();
        assert_eq!(store.poll("j1").await.unwrap(), PollStatus::Pending);

        let result = JobResult::completed("valve", 0.5);
        store.put("j1", &result).await.unwrap();

        assert_eq!(store.get("j1").await.unwrap(), Some(result.clone()));
        assert_eq!(store.poll("j1").await.unwrap(), PollStatus::Ready(result));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryResultStore::new();
        store.put("j1", &JobResult::error("first")).await.unwrap();
        store.put("j1", &JobResult::error("second")).await.unwrap();

        assert_eq!(store.get("j1").await.unwrap(), Some(JobResult::error("second")));
        assert_eq!(store.len().await, 1);
    }
}
