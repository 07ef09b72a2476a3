//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL dialect, data source, target preparer, replication slots
//! - [`mysql`]: MySQL dialect
//! - [`mssql`]: Microsoft SQL Server dialect
//! - [`common`]: Shared utilities (TLS)
//!
//! # Dispatch
//!
//! Dialects are selected by database type and wrapped in [`DialectImpl`].
//! The compiler generates a match statement instead of using vtable dispatch.

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};

pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::{
    connect_pool, PgDataSource, PgReplicationSlotManager, PgTargetPreparer, PostgresDialect,
};

use crate::core::traits::Dialect;
use crate::error::{MigrateError, Result};

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mssql(MssqlDialect),
    Mysql(MysqlDialect),
    Postgres(PostgresDialect),
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Mssql(d) => d.name(),
            DialectImpl::Mysql(d) => d.name(),
            DialectImpl::Postgres(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectImpl::Mssql(d) => d.quote_ident(name),
            DialectImpl::Mysql(d) => d.quote_ident(name),
            DialectImpl::Postgres(d) => d.quote_ident(name),
        }
    }

    fn build_split_by_key_range_sql(&self, schema: &str, table: &str, key: &str) -> String {
        match self {
            DialectImpl::Mssql(d) => d.build_split_by_key_range_sql(schema, table, key),
            DialectImpl::Mysql(d) => d.build_split_by_key_range_sql(schema, table, key),
            DialectImpl::Postgres(d) => d.build_split_by_key_range_sql(schema, table, key),
        }
    }

    fn build_min_key_sql(&self, schema: &str, table: &str, key: &str) -> String {
        match self {
            DialectImpl::Mssql(d) => d.build_min_key_sql(schema, table, key),
            DialectImpl::Mysql(d) => d.build_min_key_sql(schema, table, key),
            DialectImpl::Postgres(d) => d.build_min_key_sql(schema, table, key),
        }
    }

    fn supports_incremental(&self) -> bool {
        match self {
            DialectImpl::Mssql(d) => d.supports_incremental(),
            DialectImpl::Mysql(d) => d.supports_incremental(),
            DialectImpl::Postgres(d) => d.supports_incremental(),
        }
    }
}

impl DialectImpl {
    /// Create a dialect implementation from a database type string.
    ///
    /// # Errors
    ///
    /// Returns an error if the database type is not recognized.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        match db_type.to_lowercase().as_str() {
            "mssql" | "sqlserver" | "sql_server" => Ok(DialectImpl::Mssql(MssqlDialect::new())),
            "mysql" | "mariadb" => Ok(DialectImpl::Mysql(MysqlDialect::new())),
            "postgres" | "postgresql" | "pg" => Ok(DialectImpl::Postgres(PostgresDialect::new())),
            other => Err(MigrateError::Config(format!(
                "Unknown database type: '{}'. Supported types: mssql, mysql, postgres",
                other
            ))),
        }
    }
}
