//! Task execution engine.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PipelineTask, TaskResult};
use crate::config::ProcessConfig;
use crate::error::{MigrateError, Result};

/// Handle of a submitted task.
pub type TaskHandle = JoinHandle<Result<TaskResult>>;

/// Runs pipeline tasks in the background.
pub trait ExecuteEngine: Send + Sync {
    /// Schedule a task; the returned handle resolves when it finishes.
    fn submit(&self, task: Arc<dyn PipelineTask>) -> TaskHandle;
}

/// Engine running each task on `tokio::spawn`, bounded by a worker semaphore.
pub struct TokioExecuteEngine {
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl TokioExecuteEngine {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Engine sized for a job: one worker per configured reader and writer.
    pub fn for_process(process: &ProcessConfig) -> Self {
        Self::new(process.get_task_workers())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl ExecuteEngine for TokioExecuteEngine {
    fn submit(&self, task: Arc<dyn PipelineTask>) -> TaskHandle {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| MigrateError::Cancelled)?;
            debug!("{}: started", task.task_id());
            let result = task.start().await;
            if let Err(e) = &result {
                warn!("{}: failed: {}", task.task_id(), e);
            }
            result
        })
    }
}
