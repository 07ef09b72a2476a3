//! Migration job preparer.
//!
//! Sequences one shard item through:
//!
//! 1. Source reachability check
//! 2. One-time target preparation under the job's `prepare-{jobId}` lock,
//!    fanning PREPARE_SUCCESS out to every item of the job
//! 3. Incremental position bootstrap and incremental task construction
//! 4. Inventory task construction
//! 5. Persisting the resulting manifest so a restart resumes from it
//!
//! The stop flag is checked before the lock, after it, and after the
//! incremental bootstrap.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::JobConfiguration;
use crate::core::schema::UniqueKeyColumn;
use crate::core::traits::{Dialect, IncrementalPositionManager, JobRegistry, TargetPreparer};
use crate::error::{MigrateError, Result};
use crate::lock::{LockDefinition, LockService};
use crate::state::{JobItemProgress, JobStatus, ProgressStore};
use crate::task::IncrementalTask;

use super::context::JobItemContext;
use super::splitter::InventoryTaskSplitter;

/// Result of a prepare call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Tasks are built and progress is persisted.
    Prepared,
    /// The job was stopped; no further work was done.
    Stopped,
}

/// Prepares job items using injected collaborators.
pub struct MigrationJobPreparer {
    store: Arc<dyn ProgressStore>,
    lock: Arc<dyn LockService>,
    target: Arc<dyn TargetPreparer>,
    positions: Arc<dyn IncrementalPositionManager>,
    registry: Arc<dyn JobRegistry>,
}

impl MigrationJobPreparer {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        lock: Arc<dyn LockService>,
        target: Arc<dyn TargetPreparer>,
        positions: Arc<dyn IncrementalPositionManager>,
        registry: Arc<dyn JobRegistry>,
    ) -> Self {
        Self {
            store,
            lock,
            target,
            positions,
            registry,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    /// Prepare one shard item.
    pub async fn prepare(&self, ctx: &mut JobItemContext) -> Result<PrepareOutcome> {
        ctx.source.check_connection().await?;

        if ctx.is_stopping() {
            return Ok(self.stopped(ctx).await);
        }

        self.prepare_and_check_target_with_lock(ctx).await?;

        if ctx.is_stopping() {
            return Ok(self.stopped(ctx).await);
        }

        match self.prepare_and_check_tasks(ctx).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_data_access() || matches!(e, MigrateError::PrepareFailed { .. }) => {
                Err(MigrateError::prepare_failed(
                    format!(
                        "job preparing failed, jobId={}, shardItem={}",
                        ctx.job_id(),
                        ctx.shard_item
                    ),
                    e,
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Run the one-time target preparation while holding the job's prepare lock.
    pub async fn prepare_and_check_target_with_lock(&self, ctx: &mut JobItemContext) -> Result<()> {
        let job_id = ctx.job_id().to_string();
        let shard_item = ctx.shard_item;

        let initial = JobItemProgress::new(ctx.status);
        if self
            .store
            .persist_progress_if_absent(&job_id, shard_item, &initial)
            .await?
        {
            debug!("Job {} item {}: wrote initial progress", job_id, shard_item);
        }

        let lock = LockDefinition::exclusive(ctx.job.prepare_lock_name());
        let timeout = ctx.process.process().get_lock_timeout();

        if !self.lock.try_lock(&lock, timeout).await? {
            // Another worker may still be holding the lock after finishing the target
            let prepared = self
                .store
                .get_progress(&job_id, shard_item)
                .await?
                .map(|p| p.status.is_prepared())
                .unwrap_or(false);
            if !prepared {
                return Err(MigrateError::LockTimeout {
                    lock: lock.name().to_string(),
                    timeout,
                });
            }
            info!(
                "Job {} item {}: lock {} busy but target already prepared",
                job_id,
                shard_item,
                lock.name()
            );
            ctx.status = JobStatus::PrepareSuccess;
            return Ok(());
        }

        let result = self.prepare_target_locked(ctx).await;
        if let Err(e) = self.lock.unlock(&lock).await {
            warn!("Job {}: failed to release lock {}: {}", job_id, lock.name(), e);
        }
        result?;

        ctx.status = JobStatus::PrepareSuccess;
        Ok(())
    }

    async fn prepare_target_locked(&self, ctx: &mut JobItemContext) -> Result<()> {
        let job_id = ctx.job_id().to_string();
        let status = self
            .store
            .get_progress(&job_id, ctx.shard_item)
            .await?
            .map(|p| p.status);
        if !status.map_or(true, |s| s.needs_prepare()) {
            debug!(
                "Job {} item {}: target already prepared ({:?})",
                job_id, ctx.shard_item, status
            );
            return Ok(());
        }

        ctx.status = JobStatus::Preparing;
        self.store
            .update_status(&job_id, ctx.shard_item, JobStatus::Preparing)
            .await?;

        self.prepare_and_check_target(ctx).await?;

        for item in 0..ctx.job.sharding_count {
            self.store
                .update_status(&job_id, item, JobStatus::PrepareSuccess)
                .await?;
        }
        info!(
            "Job {}: target prepared, {} item(s) marked PREPARE_SUCCESS",
            job_id, ctx.job.sharding_count
        );
        Ok(())
    }

    /// Create the job's target schemas/tables and verify they can be imported into.
    async fn prepare_and_check_target(&self, ctx: &JobItemContext) -> Result<()> {
        if !ctx.job.is_source_target_same_database() {
            let create_table = ctx.job.create_table_configuration();
            self.target.prepare_target_schemas(&create_table).await?;
            self.target.prepare_target_tables(&create_table).await?;
        }

        let first_run = ctx
            .init_progress
            .as_ref()
            .map_or(true, |p| p.status == JobStatus::PreparingFailure);
        if first_run {
            let mut importer = ctx.task_config.importer.clone();
            importer.tables = ctx.job.target_tables();
            self.target.check_target_tables(&importer).await?;
        }
        Ok(())
    }

    async fn prepare_and_check_tasks(&self, ctx: &mut JobItemContext) -> Result<PrepareOutcome> {
        if ctx.dialect.supports_incremental() {
            self.prepare_incremental(ctx).await?;
            if ctx.is_stopping() {
                return Ok(self.stopped(ctx).await);
            }
        }

        let unique_key = self.resolve_unique_key(ctx).await?;
        let tasks = InventoryTaskSplitter::new(ctx)
            .split_inventory_data(&unique_key)
            .await?;
        ctx.inventory_tasks = tasks.into_iter().map(Arc::new).collect();

        self.persist_manifest(ctx).await?;
        Ok(PrepareOutcome::Prepared)
    }

    async fn prepare_incremental(&self, ctx: &mut JobItemContext) -> Result<()> {
        let stored = ctx.resumable_progress().and_then(|p| p.incremental.clone());
        let position = match stored {
            Some(position) => {
                debug!("Job {} item {}: reusing incremental position {}", ctx.job_id(), ctx.shard_item, position);
                position
            }
            None => self.positions.init_position(&ctx.job, ctx.shard_item).await?,
        };

        let task = IncrementalTask::new(
            ctx.task_config.dumper.clone(),
            ctx.task_config.importer.clone(),
            position,
            ctx.process.ingest_factory(),
            ctx.process.process().get_channel_capacity(),
            ctx.cancel_token().child_token(),
        );
        ctx.incremental_tasks = vec![Arc::new(task)];
        Ok(())
    }

    /// The configured unique key, with its type looked up on the source when omitted.
    async fn resolve_unique_key(&self, ctx: &JobItemContext) -> Result<UniqueKeyColumn> {
        let configured = &ctx.job.unique_key;
        if configured.data_type.is_some() {
            return Ok(configured.clone());
        }

        let Some(first) = ctx.task_config.dumper.tables.first() else {
            return Ok(configured.clone());
        };
        let columns = ctx
            .metadata
            .load_columns(&ctx.task_config.dumper.schema, first.actual.original())
            .await?;
        let column = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&configured.name))
            .ok_or_else(|| {
                MigrateError::split_job(
                    first.actual.original(),
                    format!("unique key column {} not found", configured.name),
                )
            })?;
        Ok(UniqueKeyColumn::new(configured.name.clone(), column.data_type.clone()))
    }

    async fn persist_manifest(&self, ctx: &JobItemContext) -> Result<()> {
        let mut progress = JobItemProgress::new(JobStatus::PrepareSuccess);
        for task in &ctx.inventory_tasks {
            let config = task.dumper_config();
            progress
                .inventory
                .entry(config.actual_table.lowercase().to_string())
                .or_default()
                .push(config.position.clone());
        }
        progress.incremental = ctx
            .incremental_tasks
            .first()
            .map(|task| task.position().clone());

        self.store
            .persist_progress(ctx.job_id(), ctx.shard_item, &progress)
            .await
    }

    async fn stopped(&self, ctx: &mut JobItemContext) -> PrepareOutcome {
        info!("Job {} item {}: stopping before prepare finished", ctx.job_id(), ctx.shard_item);
        self.registry.stop(ctx.job_id()).await;
        ctx.status = JobStatus::Stopping;
        if let Err(e) = self.record_stopping(ctx).await {
            warn!("Job {} item {}: failed to record STOPPING: {}", ctx.job_id(), ctx.shard_item, e);
        }
        PrepareOutcome::Stopped
    }

    /// Persist STOPPING only over a prepared status.
    ///
    /// STOPPING does not need preparing, so writing it earlier would make the
    /// next run skip target preparation that never happened.
    async fn record_stopping(&self, ctx: &JobItemContext) -> Result<()> {
        let stored = self
            .store
            .get_progress(ctx.job_id(), ctx.shard_item)
            .await?
            .map(|p| p.status);
        if !stored.is_some_and(|s| s.is_prepared()) {
            debug!(
                "Job {} item {}: not prepared yet ({:?}), leaving status as is",
                ctx.job_id(),
                ctx.shard_item,
                stored
            );
            return Ok(());
        }
        self.store
            .update_status(ctx.job_id(), ctx.shard_item, JobStatus::Stopping)
            .await
    }

    /// Release the incremental position of every item of the job.
    ///
    /// Failures are logged per item and never returned.
    pub async fn cleanup(&self, job: &JobConfiguration) {
        for item in 0..job.sharding_count {
            if let Err(e) = self
                .positions
                .destroy_position(&job.job_id, item, &job.source)
                .await
            {
                warn!("Job {} item {}: cleanup failed: {}", job.job_id, item, e);
            }
        }
    }
}
