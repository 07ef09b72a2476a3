//! PostgreSQL target preparation.
//!
//! Creates target schemas and tables from source column metadata and
//! verifies target tables are empty before a first import.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::{debug, info};

use crate::config::{CreateTableConfiguration, CreateTableEntry, ImporterConfiguration};
use crate::core::schema::Column;
use crate::core::traits::{Dialect, MetadataLoader, TargetPreparer};
use crate::drivers::PostgresDialect;
use crate::error::{MigrateError, Result};

/// Prepares a PostgreSQL target using column metadata read from the source.
pub struct PgTargetPreparer {
    pool: Pool,
    source_metadata: Arc<dyn MetadataLoader>,
    dialect: PostgresDialect,
}

impl PgTargetPreparer {
    pub fn new(pool: Pool, source_metadata: Arc<dyn MetadataLoader>) -> Self {
        Self {
            pool,
            source_metadata,
            dialect: PostgresDialect::new(),
        }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL target connection"))
    }

    /// `CREATE TABLE IF NOT EXISTS` for one entry; the unique key becomes the primary key.
    fn generate_ddl(&self, entry: &CreateTableEntry, columns: &[Column], unique_key: &str) -> String {
        let mut defs: Vec<String> = columns
            .iter()
            .map(|c| {
                let null_clause = if c.is_nullable { "" } else { " NOT NULL" };
                format!(
                    "{} {}{}",
                    self.dialect.quote_ident(&c.name),
                    map_type(&c.data_type),
                    null_clause
                )
            })
            .collect();

        let has_key = columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(unique_key));
        if has_key {
            defs.push(format!("PRIMARY KEY ({})", self.dialect.quote_ident(unique_key)));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.dialect
                .qualify_table(&entry.target_schema, entry.target_table.lowercase()),
            defs.join(",\n    ")
        )
    }
}

#[async_trait]
impl TargetPreparer for PgTargetPreparer {
    async fn prepare_target_schemas(&self, config: &CreateTableConfiguration) -> Result<()> {
        let schemas: BTreeSet<&str> = config
            .entries
            .iter()
            .map(|e| e.target_schema.as_str())
            .collect();

        let client = self.client().await?;
        for schema in schemas {
            let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", self.dialect.quote_ident(schema));
            client.execute(&sql, &[]).await?;
            debug!("Created schema '{}'", schema);
        }
        Ok(())
    }

    async fn prepare_target_tables(&self, config: &CreateTableConfiguration) -> Result<()> {
        let client = self.client().await?;
        let mut created = HashSet::new();

        for entry in &config.entries {
            // Sharded actual tables share one logical target table
            if !created.insert((entry.target_schema.clone(), entry.target_table.clone())) {
                continue;
            }

            let columns = self
                .source_metadata
                .load_columns(&entry.source_schema, entry.source_table.original())
                .await?;
            if columns.is_empty() {
                return Err(MigrateError::query(
                    "preparing target tables",
                    format!(
                        "no columns found for source table {}.{}",
                        entry.source_schema, entry.source_table
                    ),
                ));
            }

            let ddl = self.generate_ddl(entry, &columns, &config.unique_key);
            client.execute(&ddl, &[]).await?;
            debug!(
                "Created table {}.{} from {}.{}",
                entry.target_schema, entry.target_table, entry.source_schema, entry.source_table
            );
        }

        info!("Prepared {} target table(s)", created.len());
        Ok(())
    }

    async fn check_target_tables(&self, config: &ImporterConfiguration) -> Result<()> {
        let client = self.client().await?;
        for table in &config.tables {
            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM {})",
                self.dialect.qualify_table(&config.schema, table.lowercase())
            );
            let row = client.query_one(&sql, &[]).await?;
            let has_rows: bool = row.get(0);
            if has_rows {
                return Err(MigrateError::query(
                    "checking target tables",
                    format!("target table {}.{} is not empty", config.schema, table),
                ));
            }
        }
        Ok(())
    }
}

/// Map a source column type name to a PostgreSQL type.
///
/// PostgreSQL udt names pass through unchanged.
fn map_type(data_type: &str) -> String {
    let lower = data_type.trim().to_lowercase();
    let base = lower.split('(').next().unwrap_or("").trim();
    let mapped = match base {
        "tinyint" | "smallint" => "smallint",
        "mediumint" | "int" | "integer" => "integer",
        "datetime" => "timestamp",
        "double" => "double precision",
        "float" => "real",
        "tinytext" | "mediumtext" | "longtext" => "text",
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => "bytea",
        "nvarchar" | "nchar" => "varchar",
        "bit" => "boolean",
        "uniqueidentifier" => "uuid",
        _ => return lower,
    };
    mapped.to_string()
}
