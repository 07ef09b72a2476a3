//! Incremental (change-capture) task for one job item.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{pump, IngestFactory, PipelineTask, TaskResult};
use crate::config::{DumperConfiguration, ImporterConfiguration};
use crate::core::position::IncrementalPosition;
use crate::error::Result;

/// Streams changes from the bootstrapped position until stopped.
pub struct IncrementalTask {
    task_id: String,
    dumper_config: DumperConfiguration,
    importer_config: ImporterConfiguration,
    position: IncrementalPosition,
    factory: Arc<dyn IngestFactory>,
    channel_capacity: usize,
    cancel: CancellationToken,
}

impl IncrementalTask {
    pub fn new(
        dumper_config: DumperConfiguration,
        importer_config: ImporterConfiguration,
        position: IncrementalPosition,
        factory: Arc<dyn IngestFactory>,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id: format!("{}.incremental", dumper_config.data_source_name),
            dumper_config,
            importer_config,
            position,
            factory,
            channel_capacity,
            cancel,
        }
    }

    pub fn position(&self) -> &IncrementalPosition {
        &self.position
    }
}

#[async_trait]
impl PipelineTask for IncrementalTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn start(&self) -> Result<TaskResult> {
        info!("{}: streaming from {}", self.task_id, self.position);
        let dumper = self
            .factory
            .incremental_dumper(&self.dumper_config, &self.position)?;
        let importer = self.factory.importer(&self.importer_config)?;
        pump(
            &self.task_id,
            dumper,
            importer,
            self.channel_capacity,
            self.cancel.clone(),
        )
        .await
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}
