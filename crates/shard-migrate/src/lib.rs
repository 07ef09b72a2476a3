//! # shard-migrate
//!
//! Job preparation and inventory splitting for sharded live table migrations.
//!
//! A migration job copies a set of source tables into a target database while
//! the source keeps taking writes. This library turns such a job into
//! independently executable, resumable work units:
//!
//! - **Inventory splitting** of each table into bounded unique key ranges
//! - **One-time target preparation** guarded by a per-job exclusive lock
//! - **Incremental position bootstrap** (logical replication slots on PostgreSQL)
//! - **Resume capability** via persisted job item progress (memory, file, or PostgreSQL)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shard_migrate::{
//!     JobConfiguration, JobItemContext, JobProcessContext, MigrationJob, MigrationJobPreparer,
//!     TokioExecuteEngine,
//! };
//!
//! let job = Arc::new(JobConfiguration::load("job.yaml")?);
//! let preparer = Arc::new(MigrationJobPreparer::new(store, lock, target, positions, registry.clone()));
//! let engine = Arc::new(TokioExecuteEngine::for_process(&job.process));
//! let runner = MigrationJob::new(preparer, engine, registry);
//!
//! let process = Arc::new(JobProcessContext::new(job.process.clone(), ingest_factory));
//! let mut ctx = JobItemContext::load(job, 0, process, source, metadata, store.as_ref()).await?;
//! let handles = runner.run_item(&mut ctx).await?;
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod job;
pub mod lock;
pub mod prepare;
pub mod state;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{DataSourceConfig, JobConfiguration, ProcessConfig, TaskConfiguration};
pub use crate::core::{IncrementalPosition, IngestPosition, TableMapping, TableName, UniqueKeyColumn};
pub use error::{MigrateError, Result};
pub use job::{InMemoryJobRegistry, MigrationJob};
pub use lock::{InMemoryLockService, LockDefinition, LockService, PgAdvisoryLockService};
pub use prepare::{
    InventoryDumperConfiguration, InventoryPositionResolver, InventoryTaskSplitter, JobItemContext,
    JobProcessContext, MigrationJobPreparer, PrepareOutcome,
};
pub use state::{
    DbProgressStore, FileProgressStore, JobItemProgress, JobStatus, MemoryProgressStore,
    ProgressStore,
};
pub use task::{ExecuteEngine, InventoryTask, IncrementalTask, PipelineTask, TokioExecuteEngine};
