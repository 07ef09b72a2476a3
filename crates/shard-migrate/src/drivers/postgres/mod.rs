//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PgDataSource`]: source data source and metadata loader
//! - [`PgTargetPreparer`]: target schema/table creation
//! - [`PgReplicationSlotManager`]: logical replication slot positions

mod dialect;
mod replication;
mod source;
mod target;

pub use dialect::PostgresDialect;
pub use replication::PgReplicationSlotManager;
pub use source::{connect_pool, PgDataSource};
pub use target::PgTargetPreparer;
