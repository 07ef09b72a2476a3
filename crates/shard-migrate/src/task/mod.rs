//! Executable pipeline tasks.
//!
//! Prepare produces [`InventoryTask`]s (one per key range) and at most one
//! [`IncrementalTask`] per job item. Each task wires a [`Dumper`] to an
//! [`Importer`] through a bounded channel; both come from the injected
//! [`IngestFactory`], which owns the wire-level capture and apply logic.

mod engine;
mod incremental;
mod inventory;
mod rate_limit;

pub use engine::{ExecuteEngine, TaskHandle, TokioExecuteEngine};
pub use incremental::IncrementalTask;
pub use inventory::InventoryTask;
pub use rate_limit::{QpsRateLimitAlgorithm, RateLimitAlgorithm};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{DumperConfiguration, ImporterConfiguration};
use crate::core::position::IncrementalPosition;
use crate::error::Result;
use crate::prepare::InventoryDumperConfiguration;

/// Unit of data flowing from a dumper to an importer.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// One row or row change. The payload encoding belongs to the ingest implementation.
    Data { table: String, payload: Vec<u8> },

    /// The dumper reached the end of its range.
    Finished,
}

/// Outcome of a completed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_id: String,
    pub records: u64,
    pub cancelled: bool,
}

/// A task the execution engine can run.
#[async_trait]
pub trait PipelineTask: Send + Sync {
    fn task_id(&self) -> &str;

    /// Run until the task's data is exhausted or it is stopped.
    async fn start(&self) -> Result<TaskResult>;

    /// Request a cooperative stop.
    fn stop(&self);
}

/// Reads from the source and pushes records into the channel.
#[async_trait]
pub trait Dumper: Send + Sync {
    async fn run(&self, tx: mpsc::Sender<Record>, cancel: CancellationToken) -> Result<()>;
}

/// Drains the channel into the target. Returns the number of data records applied.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn run(&self, rx: mpsc::Receiver<Record>, cancel: CancellationToken) -> Result<u64>;
}

/// Creates dumpers and importers for tasks.
pub trait IngestFactory: Send + Sync {
    fn inventory_dumper(&self, config: &InventoryDumperConfiguration) -> Result<Box<dyn Dumper>>;

    fn incremental_dumper(
        &self,
        config: &DumperConfiguration,
        position: &IncrementalPosition,
    ) -> Result<Box<dyn Dumper>>;

    fn importer(&self, config: &ImporterConfiguration) -> Result<Box<dyn Importer>>;
}

/// Run a dumper and an importer concurrently over a fresh channel.
pub(crate) async fn pump(
    task_id: &str,
    dumper: Box<dyn Dumper>,
    importer: Box<dyn Importer>,
    capacity: usize,
    cancel: CancellationToken,
) -> Result<TaskResult> {
    let (tx, rx) = mpsc::channel::<Record>(capacity.max(1));
    let (_, records) = tokio::try_join!(
        dumper.run(tx, cancel.clone()),
        importer.run(rx, cancel.clone())
    )?;
    Ok(TaskResult {
        task_id: task_id.to_string(),
        records,
        cancelled: cancel.is_cancelled(),
    })
}
