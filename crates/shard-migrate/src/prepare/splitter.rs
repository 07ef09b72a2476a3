//! Inventory task splitting.
//!
//! A shard item's dumper configuration is split first by table, then by
//! unique key range. Every step returns new configurations; nothing handed
//! to a task is mutated afterwards.

use std::sync::Arc;

use tracing::info;

use crate::config::DumperConfiguration;
use crate::core::position::IngestPosition;
use crate::core::schema::{TableMapping, TableName, UniqueKeyColumn};
use crate::error::{MigrateError, Result};
use crate::task::{InventoryTask, RateLimitAlgorithm};

use super::context::JobItemContext;
use super::position::InventoryPositionResolver;

/// Dumper settings for one inventory task.
#[derive(Debug, Clone)]
pub struct InventoryDumperConfiguration {
    pub data_source_name: String,
    pub schema: String,
    pub actual_table: TableName,
    pub logic_table: TableName,
    pub unique_key: UniqueKeyColumn,
    pub position: IngestPosition,
    pub shard_index: u32,
    pub batch_size: usize,
    pub rate_limiter: Option<Arc<dyn RateLimitAlgorithm>>,
}

impl InventoryDumperConfiguration {
    /// Template carrying the item-wide settings. Table and range are filled in by
    /// [`for_table`](Self::for_table) and [`for_range`](Self::for_range).
    pub fn from_dumper(dumper: &DumperConfiguration, unique_key: &UniqueKeyColumn) -> Self {
        Self {
            data_source_name: dumper.data_source_name.clone(),
            schema: dumper.schema.clone(),
            actual_table: TableName::new(""),
            logic_table: TableName::new(""),
            unique_key: unique_key.clone(),
            position: IngestPosition::Placeholder,
            shard_index: 0,
            batch_size: 0,
            rate_limiter: None,
        }
    }

    pub fn for_table(&self, mapping: &TableMapping) -> Self {
        Self {
            actual_table: mapping.actual.clone(),
            logic_table: mapping.logic.clone(),
            position: IngestPosition::Placeholder,
            ..self.clone()
        }
    }

    pub fn for_range(
        &self,
        position: IngestPosition,
        shard_index: u32,
        batch_size: usize,
        rate_limiter: Option<Arc<dyn RateLimitAlgorithm>>,
    ) -> Self {
        Self {
            position,
            shard_index,
            batch_size,
            rate_limiter,
            ..self.clone()
        }
    }

    /// `{data_source}.{actual_table}#{shard_index}`
    pub fn task_id(&self) -> String {
        format!(
            "{}.{}#{}",
            self.data_source_name,
            self.actual_table.original(),
            self.shard_index
        )
    }
}

/// Builds the inventory tasks of one shard item.
pub struct InventoryTaskSplitter<'a> {
    ctx: &'a JobItemContext,
}

impl<'a> InventoryTaskSplitter<'a> {
    pub fn new(ctx: &'a JobItemContext) -> Self {
        Self { ctx }
    }

    /// One task per key range of every table owned by the item.
    pub async fn split_inventory_data(&self, unique_key: &UniqueKeyColumn) -> Result<Vec<InventoryTask>> {
        let template = InventoryDumperConfiguration::from_dumper(&self.ctx.task_config.dumper, unique_key);
        let process = &self.ctx.process;

        let tasks: Vec<InventoryTask> = self
            .split_dumper_config(&template)
            .await?
            .into_iter()
            .map(|config| {
                InventoryTask::new(
                    config,
                    self.ctx.task_config.importer.clone(),
                    process.ingest_factory(),
                    process.process().get_channel_capacity(),
                    self.ctx.cancel_token().child_token(),
                )
            })
            .collect();

        info!(
            "Job {} item {}: split into {} inventory task(s)",
            self.ctx.job_id(),
            self.ctx.shard_item,
            tasks.len()
        );
        Ok(tasks)
    }

    pub async fn split_dumper_config(
        &self,
        template: &InventoryDumperConfiguration,
    ) -> Result<Vec<InventoryDumperConfiguration>> {
        let mut result = Vec::new();
        for config in Self::split_by_table(template, &self.ctx.task_config.dumper.tables) {
            result.extend(self.split_by_primary_key(&config).await?);
        }
        Ok(result)
    }

    /// One configuration per table mapping, in configuration order.
    pub fn split_by_table(
        template: &InventoryDumperConfiguration,
        tables: &[TableMapping],
    ) -> Vec<InventoryDumperConfiguration> {
        tables.iter().map(|mapping| template.for_table(mapping)).collect()
    }

    /// One configuration per resolved position; shard indices follow discovery order.
    async fn split_by_primary_key(
        &self,
        config: &InventoryDumperConfiguration,
    ) -> Result<Vec<InventoryDumperConfiguration>> {
        let positions = InventoryPositionResolver::from_context(self.ctx)
            .resolve(config)
            .await?;
        if let Some(bad) = positions.iter().find(|p| !p.is_concrete()) {
            return Err(MigrateError::split_job(
                config.actual_table.original(),
                format!("resolved position {} is not a concrete range", bad),
            ));
        }
        let batch_size = self.ctx.process.process().get_read_batch_size();
        let rate_limiter = self.ctx.process.read_rate_limiter();

        Ok(positions
            .into_iter()
            .enumerate()
            .map(|(i, position)| {
                config.for_range(position, i as u32, batch_size, rate_limiter.clone())
            })
            .collect())
    }
}
