//! Inventory position resolution: where each range task of a table starts and ends.

use tracing::debug;

use crate::core::position::IngestPosition;
use crate::core::schema::KeyKind;
use crate::core::traits::{Dialect, SourceDataSource};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};
use crate::state::JobItemProgress;

use super::context::JobItemContext;
use super::splitter::InventoryDumperConfiguration;

/// Resolves the ordered positions of one table.
///
/// Positions stored by an earlier successful prepare are returned verbatim,
/// finished ones included, so a restarted item rebuilds the same manifest.
/// Otherwise integer keys are split into ranges of `sharding_size` rows and
/// string keys get one range over the whole printable domain.
pub struct InventoryPositionResolver<'a> {
    source: &'a dyn SourceDataSource,
    dialect: &'a DialectImpl,
    resumable: Option<&'a JobItemProgress>,
    sharding_size: i64,
}

impl<'a> InventoryPositionResolver<'a> {
    pub fn new(
        source: &'a dyn SourceDataSource,
        dialect: &'a DialectImpl,
        resumable: Option<&'a JobItemProgress>,
        sharding_size: i64,
    ) -> Self {
        Self {
            source,
            dialect,
            resumable,
            sharding_size: sharding_size.max(1),
        }
    }

    pub fn from_context(ctx: &'a JobItemContext) -> Self {
        Self::new(
            ctx.source.as_ref(),
            &ctx.dialect,
            ctx.resumable_progress(),
            ctx.process.process().get_sharding_size(),
        )
    }

    pub async fn resolve(&self, config: &InventoryDumperConfiguration) -> Result<Vec<IngestPosition>> {
        if let Some(positions) = self
            .resumable
            .and_then(|p| p.inventory_positions(&config.actual_table))
        {
            debug!(
                "{}: reusing {} stored position(s)",
                config.actual_table,
                positions.len()
            );
            return Ok(positions.clone());
        }

        match config.unique_key.kind() {
            KeyKind::Integer => self.integer_positions(config).await.map_err(|e| {
                MigrateError::prepare_failed(
                    format!(
                        "Split task for table {} by primary key {} error",
                        config.actual_table, config.unique_key.name
                    ),
                    e,
                )
            }),
            KeyKind::String => Ok(vec![IngestPosition::full_string_range()]),
            KeyKind::Unsupported => Err(MigrateError::split_job(
                config.actual_table.original(),
                format!(
                    "unique key {} has unsupported type {}",
                    config.unique_key.name,
                    config.unique_key.data_type.as_deref().unwrap_or("<unknown>")
                ),
            )),
        }
    }

    /// Walk the key space in windows of `sharding_size` rows.
    ///
    /// The scan stops on an empty window, when the first window holds only key
    /// zero, when the window end falls behind its begin, or at `i64::MAX`. An empty result
    /// becomes `[0, 0]` so every table yields at least one task.
    async fn integer_positions(&self, config: &InventoryDumperConfiguration) -> Result<Vec<IngestPosition>> {
        let table = config.actual_table.original();
        let key = &config.unique_key.name;
        let split_sql = self
            .dialect
            .build_split_by_key_range_sql(&config.schema, table, key);

        let min_sql = self.dialect.build_min_key_sql(&config.schema, table, key);
        let mut begin = match self.source.query_min_key(&min_sql).await? {
            Some(min) if min < 0 => min,
            _ => 0,
        };

        let mut positions = Vec::new();
        while let Some(end) = self
            .source
            .query_range_end(&split_sql, begin, self.sharding_size)
            .await?
        {
            if positions.is_empty() && begin == 0 && end == 0 {
                break;
            }
            if end < begin {
                break;
            }
            positions.push(IngestPosition::integer(begin, end));
            if end == i64::MAX {
                break;
            }
            begin = end + 1;
        }

        if positions.is_empty() {
            positions.push(IngestPosition::integer(0, 0));
        }
        debug!("{}: split into {} range(s)", config.actual_table, positions.len());
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{TableMapping, TableName, UniqueKeyColumn};
    use crate::state::JobStatus;
    use crate::testing::FakeSource;
    use std::sync::atomic::Ordering;

    fn config(table: &str, key_type: &str) -> InventoryDumperConfiguration {
        let template = InventoryDumperConfiguration {
            data_source_name: "ds_0".to_string(),
            schema: "public".to_string(),
            actual_table: TableName::new(""),
            logic_table: TableName::new(""),
            unique_key: UniqueKeyColumn::new("order_id", key_type),
            position: IngestPosition::Placeholder,
            shard_index: 0,
            batch_size: 0,
            rate_limiter: None,
        };
        template.for_table(&TableMapping::new(table, table))
    }

    async fn resolve(source: &FakeSource, size: i64, config: &InventoryDumperConfiguration) -> Result<Vec<IngestPosition>> {
        let dialect = DialectImpl::from_db_type("postgres").unwrap();
        InventoryPositionResolver::new(source, &dialect, None, size)
            .resolve(config)
            .await
    }

    #[tokio::test]
    async fn test_integer_key_split_into_ranges() {
        let source = FakeSource::with_keys(0..2500);
        let positions = resolve(&source, 1000, &config("t_order", "int8")).await.unwrap();
        assert_eq!(
            positions,
            vec![
                IngestPosition::integer(0, 999),
                IngestPosition::integer(1000, 1999),
                IngestPosition::integer(2000, 2499),
            ]
        );
        assert_eq!(source.range_queries.load(Ordering::SeqCst), 4);
    }

    fn assert_contiguous(positions: &[IngestPosition], first_begin: i64) {
        let mut expected = first_begin;
        for position in positions {
            let IngestPosition::IntegerRange { begin, end } = position else {
                panic!("expected an integer range, got {}", position);
            };
            assert_eq!(*begin, expected, "gap before {}", position);
            assert!(end >= begin);
            expected = end + 1;
        }
    }

    #[tokio::test]
    async fn test_gapped_keys_produce_contiguous_ranges() {
        let keys = [1, 5, 9000, 9001, 9002, 120_000];
        for size in [1, 2, 3, 4] {
            let source = FakeSource::with_keys(keys);
            let positions = resolve(&source, size, &config("t_order", "int8")).await.unwrap();

            assert_contiguous(&positions, 0);
            assert!(matches!(
                positions.last(),
                Some(IngestPosition::IntegerRange { end: 120_000, .. })
            ));
            for key in keys {
                let covering = positions
                    .iter()
                    .filter(|p| matches!(p, IngestPosition::IntegerRange { begin, end } if *begin <= key && key <= *end))
                    .count();
                assert_eq!(covering, 1, "key {} with size {}", key, size);
            }
        }

        let source = FakeSource::with_keys(keys);
        let positions = resolve(&source, 2, &config("t_order", "int8")).await.unwrap();
        assert_eq!(
            positions,
            vec![
                IngestPosition::integer(0, 5),
                IngestPosition::integer(6, 9001),
                IngestPosition::integer(9002, 120_000),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_table_yields_single_zero_range() {
        let source = FakeSource::empty();
        let positions = resolve(&source, 1000, &config("t_order", "int4")).await.unwrap();
        assert_eq!(positions, vec![IngestPosition::integer(0, 0)]);
    }

    #[tokio::test]
    async fn test_only_key_zero_stops_after_first_window() {
        let source = FakeSource::with_keys([0]);
        let positions = resolve(&source, 1000, &config("t_order", "int4")).await.unwrap();
        assert_eq!(positions, vec![IngestPosition::integer(0, 0)]);
        assert_eq!(source.range_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_keys_start_at_minimum() {
        let source = FakeSource::with_keys(-5..=4);
        let positions = resolve(&source, 4, &config("t_order", "bigint")).await.unwrap();
        assert_eq!(
            positions,
            vec![
                IngestPosition::integer(-5, -2),
                IngestPosition::integer(-1, 2),
                IngestPosition::integer(3, 4),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_advancing_end_terminates() {
        let source = FakeSource::stuck_at(5);
        let positions = resolve(&source, 10, &config("t_order", "int8")).await.unwrap();
        assert_eq!(positions, vec![IngestPosition::integer(0, 5)]);
        assert_eq!(source.range_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_max_key_terminates() {
        let source = FakeSource::with_keys([1, i64::MAX]);
        let positions = resolve(&source, 1000, &config("t_order", "int8")).await.unwrap();
        assert_eq!(positions, vec![IngestPosition::integer(0, i64::MAX)]);
    }

    #[tokio::test]
    async fn test_string_key_single_full_range() {
        let source = FakeSource::with_keys(0..10);
        let positions = resolve(&source, 1000, &config("sessions", "varchar")).await.unwrap();
        assert_eq!(positions, vec![IngestPosition::full_string_range()]);
        assert_eq!(source.range_queries.load(Ordering::SeqCst), 0);
        assert_eq!(source.min_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_key_type() {
        let source = FakeSource::empty();
        let err = resolve(&source, 1000, &config("t_order", "blob")).await.unwrap_err();
        assert!(matches!(err, MigrateError::SplitJob { .. }));
    }

    #[tokio::test]
    async fn test_query_error_names_table_and_key() {
        let source = FakeSource::failing();
        let err = resolve(&source, 1000, &config("t_order", "int8")).await.unwrap_err();
        assert!(matches!(err, MigrateError::PrepareFailed { .. }));
        assert_eq!(
            err.to_string(),
            "Split task for table t_order by primary key order_id error"
        );
    }

    #[tokio::test]
    async fn test_stored_positions_are_reused() {
        let source = FakeSource::with_keys(0..5000);
        let dialect = DialectImpl::from_db_type("postgres").unwrap();
        let stored = vec![IngestPosition::Finished, IngestPosition::integer(1000, 1999)];
        let mut progress = JobItemProgress::new(JobStatus::PrepareSuccess);
        progress.set_inventory_positions(&TableName::new("T_ORDER"), stored.clone());

        let positions = InventoryPositionResolver::new(&source, &dialect, Some(&progress), 1000)
            .resolve(&config("t_order", "int8"))
            .await
            .unwrap();
        assert_eq!(positions, stored);
        assert_eq!(source.range_queries.load(Ordering::SeqCst), 0);
    }
}
