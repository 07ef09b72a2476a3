//! Inventory (snapshot) task covering one key range of one table.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{pump, IngestFactory, PipelineTask, TaskResult};
use crate::config::ImporterConfiguration;
use crate::core::position::IngestPosition;
use crate::error::{MigrateError, Result};
use crate::prepare::InventoryDumperConfiguration;

/// Copies one range of a table from source to target.
pub struct InventoryTask {
    task_id: String,
    dumper_config: InventoryDumperConfiguration,
    importer_config: ImporterConfiguration,
    factory: Arc<dyn IngestFactory>,
    channel_capacity: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for InventoryTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryTask")
            .field("task_id", &self.task_id)
            .field("dumper_config", &self.dumper_config)
            .field("importer_config", &self.importer_config)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

impl InventoryTask {
    pub fn new(
        dumper_config: InventoryDumperConfiguration,
        importer_config: ImporterConfiguration,
        factory: Arc<dyn IngestFactory>,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id: dumper_config.task_id(),
            dumper_config,
            importer_config,
            factory,
            channel_capacity,
            cancel,
        }
    }

    pub fn dumper_config(&self) -> &InventoryDumperConfiguration {
        &self.dumper_config
    }

    pub fn position(&self) -> &IngestPosition {
        &self.dumper_config.position
    }
}

#[async_trait]
impl PipelineTask for InventoryTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn start(&self) -> Result<TaskResult> {
        if self.position().is_finished() {
            debug!("{}: already finished, skipping", self.task_id);
            return Ok(TaskResult {
                task_id: self.task_id.clone(),
                records: 0,
                cancelled: false,
            });
        }
        if !self.position().is_concrete() {
            return Err(MigrateError::task(
                &self.task_id,
                format!("position {} is not a concrete range", self.position()),
            ));
        }

        let dumper = self.factory.inventory_dumper(&self.dumper_config)?;
        let importer = self.factory.importer(&self.importer_config)?;
        let result = pump(
            &self.task_id,
            dumper,
            importer,
            self.channel_capacity,
            self.cancel.clone(),
        )
        .await?;

        info!(
            "{}: range {} done ({} records)",
            self.task_id,
            self.position(),
            result.records
        );
        Ok(result)
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_config, CountingIngest};

    fn task(position: IngestPosition) -> InventoryTask {
        let job = job_config(1, &[("t_order_0", "t_order")], Some("int8"));
        let item = job.task_configuration(0);
        let config = InventoryDumperConfiguration::from_dumper(&item.dumper, &job.unique_key)
            .for_table(&job.tables[0])
            .for_range(position, 0, 100, None);
        InventoryTask::new(
            config,
            item.importer,
            Arc::new(CountingIngest { rows_per_dumper: 2 }),
            8,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_placeholder_position_is_rejected() {
        let err = task(IngestPosition::Placeholder).start().await.unwrap_err();
        assert!(matches!(err, MigrateError::Task { .. }));
        assert!(err.to_string().contains("ds_0.t_order_0#0"));
    }

    #[tokio::test]
    async fn test_finished_position_is_skipped() {
        let result = task(IngestPosition::Finished).start().await.unwrap();
        assert_eq!(result.records, 0);
    }

    #[tokio::test]
    async fn test_range_position_runs() {
        let result = task(IngestPosition::integer(0, 99)).start().await.unwrap();
        assert_eq!(result.records, 2);
        assert!(!result.cancelled);
    }
}
