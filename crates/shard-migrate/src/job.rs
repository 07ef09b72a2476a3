//! Job item runner and in-process job registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::traits::JobRegistry;
use crate::error::Result;
use crate::prepare::{JobItemContext, MigrationJobPreparer, PrepareOutcome};
use crate::state::{JobStatus, ProgressStore};
use crate::task::{ExecuteEngine, PipelineTask, TaskHandle};

/// Cancellation tokens of every running item, grouped by job.
#[derive(Default)]
pub struct InMemoryJobRegistry {
    jobs: Mutex<HashMap<String, Vec<(u32, CancellationToken)>>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job_id: &str, shard_item: u32, token: CancellationToken) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let items = jobs.entry(job_id.to_string()).or_default();
        items.retain(|(item, _)| *item != shard_item);
        items.push((shard_item, token));
    }

    /// Number of items registered for a job.
    pub fn item_count(&self, job_id: &str) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map_or(0, |items| items.len())
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn stop(&self, job_id: &str) {
        let items = {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.remove(job_id).unwrap_or_default()
        };
        for (item, token) in &items {
            info!("Stopping job {} item {}", job_id, item);
            token.cancel();
        }
    }
}

/// Drives shard items through prepare and hands their tasks to the engine.
pub struct MigrationJob {
    preparer: Arc<MigrationJobPreparer>,
    engine: Arc<dyn ExecuteEngine>,
    registry: Arc<InMemoryJobRegistry>,
}

impl MigrationJob {
    pub fn new(
        preparer: Arc<MigrationJobPreparer>,
        engine: Arc<dyn ExecuteEngine>,
        registry: Arc<InMemoryJobRegistry>,
    ) -> Self {
        Self {
            preparer,
            engine,
            registry,
        }
    }

    fn store(&self) -> &Arc<dyn ProgressStore> {
        self.preparer.store()
    }

    /// Prepare one item and submit its tasks. Handles are returned without awaiting them.
    ///
    /// A failed prepare leaves the item in PREPARING_FAILURE so the next run prepares again.
    pub async fn run_item(&self, ctx: &mut JobItemContext) -> Result<Vec<TaskHandle>> {
        self.registry
            .register(ctx.job_id(), ctx.shard_item, ctx.cancel_token());

        match self.preparer.prepare(ctx).await {
            Ok(PrepareOutcome::Stopped) => return Ok(Vec::new()),
            Ok(PrepareOutcome::Prepared) => {}
            Err(e) => {
                error!(
                    "Job {} item {}: prepare failed\n{}",
                    ctx.job_id(),
                    ctx.shard_item,
                    e.format_detailed()
                );
                ctx.status = JobStatus::PreparingFailure;
                if let Err(store_err) = self
                    .store()
                    .update_status(ctx.job_id(), ctx.shard_item, JobStatus::PreparingFailure)
                    .await
                {
                    warn!(
                        "Job {} item {}: failed to record PREPARING_FAILURE: {}",
                        ctx.job_id(),
                        ctx.shard_item,
                        store_err
                    );
                }
                return Err(e);
            }
        }

        ctx.status = JobStatus::ExecuteInventoryTask;
        self.store()
            .update_status(ctx.job_id(), ctx.shard_item, JobStatus::ExecuteInventoryTask)
            .await?;

        let mut handles = Vec::with_capacity(ctx.incremental_tasks.len() + ctx.inventory_tasks.len());
        for task in &ctx.incremental_tasks {
            handles.push(self.engine.submit(task.clone() as Arc<dyn PipelineTask>));
        }
        for task in &ctx.inventory_tasks {
            handles.push(self.engine.submit(task.clone() as Arc<dyn PipelineTask>));
        }
        info!(
            "Job {} item {}: submitted {} task(s)",
            ctx.job_id(),
            ctx.shard_item,
            handles.len()
        );
        Ok(handles)
    }

    /// Stop every item of a job.
    pub async fn stop(&self, job_id: &str) {
        self.registry.stop(job_id).await;
    }
}
