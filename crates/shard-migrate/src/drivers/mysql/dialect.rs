//! MySQL/MariaDB SQL dialect (Strategy pattern).

use crate::core::traits::Dialect;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
///
/// MySQL sources support incremental migration, but this crate ships no binlog
/// position manager. Callers supply an [`IncrementalPositionManager`] that
/// reports `IncrementalPosition::MysqlBinlog` (for example from
/// `SHOW MASTER STATUS`); the preparer persists whatever it returns.
///
/// [`IncrementalPositionManager`]: crate::core::traits::IncrementalPositionManager
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        // MySQL uses backticks; embedded backticks are doubled
        format!("`{}`", name.replace('`', "``"))
    }

    fn build_split_by_key_range_sql(&self, schema: &str, table: &str, key: &str) -> String {
        let key = self.quote_ident(key);
        format!(
            "SELECT MAX(t.{key}) FROM (SELECT {key} FROM {table} WHERE {key} >= ? ORDER BY {key} LIMIT ?) t",
            key = key,
            table = self.qualify_table(schema, table),
        )
    }

    fn build_min_key_sql(&self, schema: &str, table: &str, key: &str) -> String {
        format!(
            "SELECT MIN({}) FROM {}",
            self.quote_ident(key),
            self.qualify_table(schema, table)
        )
    }

    fn supports_incremental(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("name"), "`name`");
        assert_eq!(dialect.quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn test_build_split_by_key_range_sql() {
        let sql = MysqlDialect::new().build_split_by_key_range_sql("shop", "t_order", "order_id");
        assert_eq!(
            sql,
            "SELECT MAX(t.`order_id`) FROM (SELECT `order_id` FROM `shop`.`t_order` \
             WHERE `order_id` >= ? ORDER BY `order_id` LIMIT ?) t"
        );
    }
}
