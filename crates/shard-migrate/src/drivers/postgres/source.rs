//! PostgreSQL source data source.
//!
//! Uses deadpool-postgres for connection pooling. Implements both
//! [`SourceDataSource`] (split queries) and [`MetadataLoader`] (column metadata).

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::DataSourceConfig;
use crate::core::schema::Column;
use crate::core::traits::{MetadataLoader, SourceDataSource};
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// Build a connection pool for a data source, honoring its `ssl_mode`.
pub fn connect_pool(config: &DataSourceConfig, max_size: usize) -> Result<Pool> {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(&config.database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let context = format!(
        "creating PostgreSQL pool for {}:{}/{}",
        config.host, config.port, config.database
    );
    let pool = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
        None => {
            warn!(
                "PostgreSQL TLS is disabled for {}. Credentials will be transmitted in plaintext.",
                config.host
            );
            let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| MigrateError::pool(e, context))?
        }
        Some(tls) => {
            let mgr = Manager::from_config(pg_config, tls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| MigrateError::pool(e, context))?
        }
    };
    Ok(pool)
}

/// PostgreSQL source used while preparing a job item.
pub struct PgDataSource {
    name: String,
    pool: Pool,
}

impl PgDataSource {
    /// Create a data source from configuration. No connection is opened until first use.
    pub fn new(name: impl Into<String>, config: &DataSourceConfig, max_conns: usize) -> Result<Self> {
        let pool = connect_pool(config, max_conns)?;
        info!(
            "Created PostgreSQL source pool: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self::from_pool(name, pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }
}

#[async_trait]
impl SourceDataSource for PgDataSource {
    async fn check_connection(&self) -> Result<()> {
        let client = self.client("checking PostgreSQL source connection").await?;
        client.simple_query("SELECT 1").await?;
        debug!("Source {} is reachable", self.name);
        Ok(())
    }

    async fn query_range_end(&self, sql: &str, begin: i64, size: i64) -> Result<Option<i64>> {
        let client = self.client("querying split range").await?;
        let row = client.query_opt(sql, &[&begin, &size]).await?;
        Ok(match row {
            Some(row) => row.try_get::<_, Option<i64>>(0)?,
            None => None,
        })
    }

    async fn query_min_key(&self, sql: &str) -> Result<Option<i64>> {
        let client = self.client("querying min key").await?;
        let row = client.query_opt(sql, &[]).await?;
        Ok(match row {
            Some(row) => row.try_get::<_, Option<i64>>(0)?,
            None => None,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MetadataLoader for PgDataSource {
    async fn load_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>> {
        let client = self.client("getting connection for load_columns").await?;

        let query = r#"
            SELECT
                c.column_name,
                c.udt_name,
                CASE WHEN c.is_nullable = 'YES' THEN true ELSE false END,
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                      ON tc.constraint_name = kcu.constraint_name
                     AND tc.table_schema = kcu.table_schema
                    WHERE tc.constraint_type = 'PRIMARY KEY'
                      AND tc.table_schema = c.table_schema
                      AND tc.table_name = c.table_name
                      AND kcu.column_name = c.column_name
                ),
                c.ordinal_position::int4
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;

        let rows = client.query(query, &[&schema, &table]).await?;
        let columns: Vec<Column> = rows
            .iter()
            .map(|row| Column {
                name: row.get::<_, String>(0),
                data_type: row.get::<_, String>(1),
                is_nullable: row.get::<_, bool>(2),
                is_primary_key: row.get::<_, bool>(3),
                ordinal_pos: row.get::<_, i32>(4),
            })
            .collect();

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }
}
