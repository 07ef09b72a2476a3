//! Per-item and per-job runtime context for prepare.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{JobConfiguration, ProcessConfig, TaskConfiguration};
use crate::core::traits::{MetadataLoader, SourceDataSource};
use crate::drivers::DialectImpl;
use crate::error::Result;
use crate::state::{JobItemProgress, JobStatus, ProgressStore};
use crate::task::{IncrementalTask, IngestFactory, InventoryTask, QpsRateLimitAlgorithm, RateLimitAlgorithm};

/// Job-wide processing resources shared by every item.
pub struct JobProcessContext {
    process: ProcessConfig,
    read_rate_limiter: Option<Arc<dyn RateLimitAlgorithm>>,
    ingest_factory: Arc<dyn IngestFactory>,
}

impl JobProcessContext {
    pub fn new(process: ProcessConfig, ingest_factory: Arc<dyn IngestFactory>) -> Self {
        let read_rate_limiter = process
            .read_qps
            .map(|qps| Arc::new(QpsRateLimitAlgorithm::new(qps)) as Arc<dyn RateLimitAlgorithm>);
        Self {
            process,
            read_rate_limiter,
            ingest_factory,
        }
    }

    pub fn process(&self) -> &ProcessConfig {
        &self.process
    }

    pub fn read_rate_limiter(&self) -> Option<Arc<dyn RateLimitAlgorithm>> {
        self.read_rate_limiter.clone()
    }

    pub fn ingest_factory(&self) -> Arc<dyn IngestFactory> {
        self.ingest_factory.clone()
    }
}

/// Mutable state of one shard item while it is prepared and run.
pub struct JobItemContext {
    pub job: Arc<JobConfiguration>,
    pub shard_item: u32,
    pub status: JobStatus,
    pub task_config: TaskConfiguration,
    pub process: Arc<JobProcessContext>,
    pub source: Arc<dyn SourceDataSource>,
    pub metadata: Arc<dyn MetadataLoader>,
    pub dialect: DialectImpl,

    /// Progress found in the store when the context was built.
    pub init_progress: Option<JobItemProgress>,

    pub inventory_tasks: Vec<Arc<InventoryTask>>,
    pub incremental_tasks: Vec<Arc<IncrementalTask>>,
    cancel: CancellationToken,
}

impl JobItemContext {
    /// Build a fresh context. It starts as PREPARING_FAILURE until prepare succeeds.
    pub fn new(
        job: Arc<JobConfiguration>,
        shard_item: u32,
        process: Arc<JobProcessContext>,
        source: Arc<dyn SourceDataSource>,
        metadata: Arc<dyn MetadataLoader>,
        init_progress: Option<JobItemProgress>,
    ) -> Result<Self> {
        let dialect = DialectImpl::from_db_type(&job.source.r#type)?;
        let task_config = job.task_configuration(shard_item);
        Ok(Self {
            job,
            shard_item,
            status: JobStatus::PreparingFailure,
            task_config,
            process,
            source,
            metadata,
            dialect,
            init_progress,
            inventory_tasks: Vec::new(),
            incremental_tasks: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Build a context whose `init_progress` is read from the store.
    pub async fn load(
        job: Arc<JobConfiguration>,
        shard_item: u32,
        process: Arc<JobProcessContext>,
        source: Arc<dyn SourceDataSource>,
        metadata: Arc<dyn MetadataLoader>,
        store: &dyn ProgressStore,
    ) -> Result<Self> {
        let init_progress = store.get_progress(&job.job_id, shard_item).await?;
        debug!(
            "Loaded job {} item {} progress: {:?}",
            job.job_id,
            shard_item,
            init_progress.as_ref().map(|p| p.status)
        );
        Self::new(job, shard_item, process, source, metadata, init_progress)
    }

    pub fn job_id(&self) -> &str {
        &self.job.job_id
    }

    /// Stored progress that may be resumed from. A PREPARING_FAILURE record never is.
    pub fn resumable_progress(&self) -> Option<&JobItemProgress> {
        self.init_progress
            .as_ref()
            .filter(|p| p.status != JobStatus::PreparingFailure)
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request a stop of this item and every task it produced.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled when the item is stopped.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
