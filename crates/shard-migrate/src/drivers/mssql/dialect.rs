//! Microsoft SQL Server SQL dialect (Strategy pattern).

use crate::core::traits::Dialect;

/// SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new SQL Server dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> String {
        // SQL Server uses brackets; a closing bracket is escaped as ]]
        format!("[{}]", name.replace(']', "]]"))
    }

    fn build_split_by_key_range_sql(&self, schema: &str, table: &str, key: &str) -> String {
        let key = self.quote_ident(key);
        format!(
            "SELECT MAX(t.{key}) FROM (SELECT TOP (@P2) {key} FROM {table} WITH (NOLOCK) WHERE {key} >= @P1 ORDER BY {key}) t",
            key = key,
            table = self.qualify_table(schema, table),
        )
    }

    fn build_min_key_sql(&self, schema: &str, table: &str, key: &str) -> String {
        format!(
            "SELECT MIN({}) FROM {} WITH (NOLOCK)",
            self.quote_ident(key),
            self.qualify_table(schema, table)
        )
    }

    fn supports_incremental(&self) -> bool {
        false
    }
}
