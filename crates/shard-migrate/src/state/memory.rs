//! In-process progress store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{JobItemProgress, JobStatus, ProgressStore};
use crate::error::Result;

/// Progress kept in a map; lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    items: RwLock<HashMap<(String, u32), JobItemProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn get_progress(&self, job_id: &str, shard_item: u32) -> Result<Option<JobItemProgress>> {
        let items = self.items.read().await;
        Ok(items.get(&(job_id.to_string(), shard_item)).cloned())
    }

    async fn persist_progress(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<()> {
        let mut items = self.items.write().await;
        let mut progress = progress.clone();
        progress.updated_at = Utc::now();
        items.insert((job_id.to_string(), shard_item), progress);
        Ok(())
    }

    async fn persist_progress_if_absent(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<bool> {
        let mut items = self.items.write().await;
        let key = (job_id.to_string(), shard_item);
        if items.contains_key(&key) {
            return Ok(false);
        }
        items.insert(key, progress.clone());
        Ok(true)
    }

    async fn update_status(&self, job_id: &str, shard_item: u32, status: JobStatus) -> Result<()> {
        let mut items = self.items.write().await;
        let entry = items
            .entry((job_id.to_string(), shard_item))
            .or_insert_with(|| JobItemProgress::status_only(status));
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::position::IngestPosition;
    use crate::core::schema::TableName;

    #[tokio::test]
    async fn test_update_status_creates_status_only_record() {
        let store = MemoryProgressStore::new();
        assert!(store.get_progress("j1", 1).await.unwrap().is_none());

        store.update_status("j1", 1, JobStatus::PrepareSuccess).await.unwrap();
        let progress = store.get_progress("j1", 1).await.unwrap().unwrap();
        assert_eq!(progress.status, JobStatus::PrepareSuccess);
        assert!(!progress.has_positions());
    }

    #[tokio::test]
    async fn test_update_status_keeps_positions() {
        let store = MemoryProgressStore::new();
        let mut progress = JobItemProgress::new(JobStatus::PrepareSuccess);
        progress.set_inventory_positions(&TableName::new("t_order"), vec![IngestPosition::integer(0, 9)]);
        store.persist_progress("j1", 0, &progress).await.unwrap();

        store
            .update_status("j1", 0, JobStatus::ExecuteInventoryTask)
            .await
            .unwrap();
        let loaded = store.get_progress("j1", 0).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::ExecuteInventoryTask);
        assert_eq!(loaded.inventory, progress.inventory);
    }

    #[tokio::test]
    async fn test_persist_if_absent_does_not_overwrite() {
        let store = MemoryProgressStore::new();
        store.update_status("j1", 0, JobStatus::PrepareSuccess).await.unwrap();

        let written = store
            .persist_progress_if_absent("j1", 0, &JobItemProgress::new(JobStatus::PreparingFailure))
            .await
            .unwrap();
        assert!(!written);
        let progress = store.get_progress("j1", 0).await.unwrap().unwrap();
        assert_eq!(progress.status, JobStatus::PrepareSuccess);
    }
}
