//! Progress store trait for job item progress.
//!
//! The [`ProgressStore`] trait decouples the preparer from where progress
//! lives. The preparer works with `Arc<dyn ProgressStore>` without knowing
//! the concrete type.

use async_trait::async_trait;

use super::{JobItemProgress, JobStatus};
use crate::error::{MigrateError, Result};

/// Persistence backend for job item progress.
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
///
/// # Example
///
/// ```rust,ignore
/// let store: Arc<dyn ProgressStore> = Arc::new(DbProgressStore::new(pool));
/// store.init_schema().await?;
/// store.update_status("j1", 0, JobStatus::Preparing).await?;
/// let progress = store.get_progress("j1", 0).await?;
/// ```
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create whatever storage structure the backend needs. Idempotent.
    async fn init_schema(&self) -> Result<()>;

    /// Progress of one job item, `None` if nothing was ever written.
    async fn get_progress(&self, job_id: &str, shard_item: u32) -> Result<Option<JobItemProgress>>;

    /// Replace the progress of one job item.
    async fn persist_progress(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<()>;

    /// Write `progress` only if the item has no record yet. Returns whether it was written.
    async fn persist_progress_if_absent(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<bool>;

    /// Set the status of one job item, keeping its positions.
    ///
    /// Creates a status-only record when the item has no progress yet.
    /// Safe to repeat.
    async fn update_status(&self, job_id: &str, shard_item: u32, status: JobStatus) -> Result<()>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}

/// Convert a JobStatus to its stored string representation.
pub fn job_status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "RUNNING",
        JobStatus::Preparing => "PREPARING",
        JobStatus::PrepareSuccess => "PREPARE_SUCCESS",
        JobStatus::PreparingFailure => "PREPARING_FAILURE",
        JobStatus::ExecuteInventoryTask => "EXECUTE_INVENTORY_TASK",
        JobStatus::ExecuteIncrementalTask => "EXECUTE_INCREMENTAL_TASK",
        JobStatus::Finished => "FINISHED",
        JobStatus::ExecuteFailure => "EXECUTE_FAILURE",
        JobStatus::Stopping => "STOPPING",
    }
}

/// Parse a JobStatus from its stored string representation.
pub fn str_to_job_status(s: &str) -> Result<JobStatus> {
    match s {
        "RUNNING" => Ok(JobStatus::Running),
        "PREPARING" => Ok(JobStatus::Preparing),
        "PREPARE_SUCCESS" => Ok(JobStatus::PrepareSuccess),
        "PREPARING_FAILURE" => Ok(JobStatus::PreparingFailure),
        "EXECUTE_INVENTORY_TASK" => Ok(JobStatus::ExecuteInventoryTask),
        "EXECUTE_INCREMENTAL_TASK" => Ok(JobStatus::ExecuteIncrementalTask),
        "FINISHED" => Ok(JobStatus::Finished),
        "EXECUTE_FAILURE" => Ok(JobStatus::ExecuteFailure),
        "STOPPING" => Ok(JobStatus::Stopping),
        _ => Err(MigrateError::State(format!("Invalid job status: {}", s))),
    }
}
