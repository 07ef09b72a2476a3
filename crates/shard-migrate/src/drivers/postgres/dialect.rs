//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific syntax for identifier quoting and the
//! key-range queries issued while splitting a table.

use crate::core::traits::Dialect;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Handle names that contain double quotes by doubling them
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn build_split_by_key_range_sql(&self, schema: &str, table: &str, key: &str) -> String {
        // Casts let int2/int4 keys bind and decode as i64
        let key = self.quote_ident(key);
        format!(
            "SELECT MAX(t.{key})::int8 FROM (SELECT {key} FROM {table} WHERE {key} >= $1::int8 ORDER BY {key} LIMIT $2::int8) t",
            key = key,
            table = self.qualify_table(schema, table),
        )
    }

    fn build_min_key_sql(&self, schema: &str, table: &str, key: &str) -> String {
        format!(
            "SELECT MIN({})::int8 FROM {}",
            self.quote_ident(key),
            self.qualify_table(schema, table)
        )
    }

    fn supports_incremental(&self) -> bool {
        true
    }
}
