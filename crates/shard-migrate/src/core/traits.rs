//! Collaborator traits consumed by the job preparer.
//!
//! The preparer never talks to a database directly. Everything it needs is
//! expressed here and injected at construction time:
//!
//! - [`Dialect`]: SQL syntax for split and min-key queries
//! - [`SourceDataSource`]: reachability check and key-range queries against the source
//! - [`MetadataLoader`]: column metadata used to resolve unique key types and build DDL
//! - [`TargetPreparer`]: one-time schema/table creation on the target
//! - [`IncrementalPositionManager`]: change-capture resume positions
//! - [`JobRegistry`]: the stop path of the job management layer

use async_trait::async_trait;

use crate::config::{CreateTableConfiguration, DataSourceConfig, ImporterConfiguration, JobConfiguration};
use crate::error::Result;

use super::position::IncrementalPosition;
use super::schema::Column;

/// SQL dialect for the queries issued while splitting a table.
///
/// Implementations are stateless; the enum wrapper
/// [`crate::drivers::DialectImpl`] dispatches to them statically.
pub trait Dialect: Send + Sync {
    /// Database type name (e.g., "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier for this database.
    fn quote_ident(&self, name: &str) -> String;

    /// Query returning the largest key among the next `size` rows at or after `begin`.
    ///
    /// Parameter 1 is `begin`, parameter 2 is `size`. An empty window yields
    /// one row holding NULL.
    fn build_split_by_key_range_sql(&self, schema: &str, table: &str, key: &str) -> String;

    /// Query returning the smallest key of the table (NULL when empty).
    fn build_min_key_sql(&self, schema: &str, table: &str, key: &str) -> String;

    /// Whether change-data capture is available for this database type.
    fn supports_incremental(&self) -> bool;

    /// Qualified `schema.table` name.
    fn qualify_table(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }
}

/// Read access to the source database used during preparation.
#[async_trait]
pub trait SourceDataSource: Send + Sync {
    /// Verify the source is reachable.
    async fn check_connection(&self) -> Result<()>;

    /// Run a split query built by [`Dialect::build_split_by_key_range_sql`].
    ///
    /// Binds `begin` and `size` in that order and returns the single
    /// integer column of the single row, or `None` when there is no row or
    /// the value is NULL.
    async fn query_range_end(&self, sql: &str, begin: i64, size: i64) -> Result<Option<i64>>;

    /// Run a min-key query and return its value, `None` for an empty table.
    async fn query_min_key(&self, sql: &str) -> Result<Option<i64>>;

    /// Logical name of this data source, used in task ids.
    fn name(&self) -> &str;
}

/// Loads column metadata for a table.
#[async_trait]
pub trait MetadataLoader: Send + Sync {
    /// Columns of `schema.table` in ordinal order. `table` is the original-cased name.
    async fn load_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>>;
}

/// Target-side preparation.
#[async_trait]
pub trait TargetPreparer: Send + Sync {
    /// Create target schemas if they don't exist.
    async fn prepare_target_schemas(&self, config: &CreateTableConfiguration) -> Result<()>;

    /// Create target tables if they don't exist.
    async fn prepare_target_tables(&self, config: &CreateTableConfiguration) -> Result<()>;

    /// Verify target tables are empty before a first import.
    async fn check_target_tables(&self, config: &ImporterConfiguration) -> Result<()>;
}

/// Creates and destroys change-capture resume positions.
///
/// Every shard item streams changes on its own, so positions are reserved per item.
#[async_trait]
pub trait IncrementalPositionManager: Send + Sync {
    /// Reserve (or reuse) the item's position at the source's current point.
    async fn init_position(&self, job: &JobConfiguration, shard_item: u32) -> Result<IncrementalPosition>;

    /// Release any reservation made by [`init_position`](Self::init_position) for the item.
    async fn destroy_position(
        &self,
        job_id: &str,
        shard_item: u32,
        source: &DataSourceConfig,
    ) -> Result<()>;
}

/// Stop path of the job management layer.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Stop every shard item of a job.
    async fn stop(&self, job_id: &str);
}
