//! Configuration type definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::schema::{TableMapping, TableName, UniqueKeyColumn};

/// Immutable description of one migration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfiguration {
    /// Job identifier; also names the prepare lock.
    pub job_id: String,

    /// Number of shard items the job is split into (default: 1).
    #[serde(default = "default_sharding_count")]
    pub sharding_count: u32,

    /// Source database.
    pub source: DataSourceConfig,

    /// Target database.
    pub target: DataSourceConfig,

    /// Actual source table to logical table mappings, in split order.
    pub tables: Vec<TableMapping>,

    /// Unique key column used to split every table.
    pub unique_key: UniqueKeyColumn,

    /// Read/write/process tuning.
    #[serde(default)]
    pub process: ProcessConfig,
}

impl JobConfiguration {
    /// Whether source and target point at the same physical database.
    pub fn is_source_target_same_database(&self) -> bool {
        self.source.host.eq_ignore_ascii_case(&self.target.host)
            && self.source.port == self.target.port
            && self.source.database == self.target.database
    }

    /// Name of the exclusive lock guarding one-time target preparation.
    pub fn prepare_lock_name(&self) -> String {
        format!("prepare-{}", self.job_id)
    }

    /// Target tables of the whole job, whichever item owns their source tables.
    ///
    /// Target preparation runs once per job, so it must cover every item.
    pub fn create_table_configuration(&self) -> CreateTableConfiguration {
        CreateTableConfiguration {
            entries: self
                .tables
                .iter()
                .map(|t| CreateTableEntry {
                    source_schema: self.source.schema.clone(),
                    source_table: t.actual.clone(),
                    target_schema: self.target.schema.clone(),
                    target_table: t.logic.clone(),
                })
                .collect(),
            unique_key: self.unique_key.name.clone(),
        }
    }

    /// Distinct logical target tables of the job, in configuration order.
    pub fn target_tables(&self) -> Vec<TableName> {
        let mut tables: Vec<TableName> = Vec::new();
        for mapping in &self.tables {
            if !tables.contains(&mapping.logic) {
                tables.push(mapping.logic.clone());
            }
        }
        tables
    }

    /// Build the dumper/importer/DDL settings owned by one shard item.
    ///
    /// Tables are assigned round-robin: table `i` belongs to item `i % sharding_count`.
    /// Dumpers and importers only see the item's tables; `create_table` covers the job.
    pub fn task_configuration(&self, shard_item: u32) -> TaskConfiguration {
        let count = self.sharding_count.max(1) as usize;
        let tables: Vec<TableMapping> = self
            .tables
            .iter()
            .enumerate()
            .filter(|(i, _)| i % count == shard_item as usize)
            .map(|(_, t)| t.clone())
            .collect();

        let create_table = self.create_table_configuration();

        let importer = ImporterConfiguration {
            data_source: self.target.clone(),
            schema: self.target.schema.clone(),
            tables: tables.iter().map(|t| t.logic.clone()).collect(),
            unique_key: self.unique_key.name.clone(),
            batch_size: self.process.get_write_batch_size(),
            concurrency: self.process.get_importer_concurrency(),
            retry_times: self.process.get_retry_times(),
        };

        let dumper = DumperConfiguration {
            data_source_name: format!("ds_{}", shard_item),
            data_source: self.source.clone(),
            schema: self.source.schema.clone(),
            tables,
        };

        TaskConfiguration {
            dumper,
            importer,
            create_table,
        }
    }
}

/// Database connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Database type: "postgres", "mysql" or "mssql".
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Process tuning. Unset values fall back to defaults through the `get_*` accessors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessConfig {
    /// Rows fetched per inventory read batch (default: 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_batch_size: Option<usize>,

    /// Rows covered by one inventory range task (default: 1,000,000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding_size: Option<i64>,

    /// Read rate limit in queries per second (default: unlimited).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_qps: Option<u32>,

    /// Concurrent dumper workers (default: 4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_workers: Option<usize>,

    /// Concurrent importer workers (default: 4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_workers: Option<usize>,

    /// Rows per importer write batch (default: 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_batch_size: Option<usize>,

    /// Importer concurrency per task (default: 3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importer_concurrency: Option<usize>,

    /// Importer retries per batch (default: 3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_times: Option<u32>,

    /// Capacity of the dumper-to-importer channel (default: 10,000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,

    /// Seconds to wait for the prepare lock (default: 180).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_secs: Option<u64>,
}

impl ProcessConfig {
    pub fn get_read_batch_size(&self) -> usize {
        self.read_batch_size.unwrap_or(1000)
    }

    pub fn get_sharding_size(&self) -> i64 {
        self.sharding_size.unwrap_or(1_000_000)
    }

    pub fn get_read_workers(&self) -> usize {
        self.read_workers.unwrap_or(4)
    }

    pub fn get_write_workers(&self) -> usize {
        self.write_workers.unwrap_or(4)
    }

    pub fn get_write_batch_size(&self) -> usize {
        self.write_batch_size.unwrap_or(1000)
    }

    pub fn get_importer_concurrency(&self) -> usize {
        self.importer_concurrency.unwrap_or(3)
    }

    pub fn get_retry_times(&self) -> u32 {
        self.retry_times.unwrap_or(3)
    }

    pub fn get_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(10_000)
    }

    /// Total task workers for the execution engine.
    pub fn get_task_workers(&self) -> usize {
        self.get_read_workers() + self.get_write_workers()
    }

    pub fn get_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs.unwrap_or(180))
    }
}

/// Settings owned by one shard item.
#[derive(Debug, Clone)]
pub struct TaskConfiguration {
    pub dumper: DumperConfiguration,
    pub importer: ImporterConfiguration,
    pub create_table: CreateTableConfiguration,
}

/// Source-side settings shared by every dumper of a shard item.
#[derive(Debug, Clone)]
pub struct DumperConfiguration {
    /// Name used in task ids (e.g., "ds_0").
    pub data_source_name: String,

    pub data_source: DataSourceConfig,

    /// Source schema.
    pub schema: String,

    /// Tables this shard item migrates.
    pub tables: Vec<TableMapping>,
}

/// Target-side settings for importers.
#[derive(Debug, Clone)]
pub struct ImporterConfiguration {
    pub data_source: DataSourceConfig,

    /// Target schema.
    pub schema: String,

    /// Logical tables written by this shard item.
    pub tables: Vec<TableName>,

    /// Unique key column name.
    pub unique_key: String,

    pub batch_size: usize,

    pub concurrency: usize,

    pub retry_times: u32,
}

/// Tables to create on the target before the first import.
#[derive(Debug, Clone)]
pub struct CreateTableConfiguration {
    pub entries: Vec<CreateTableEntry>,

    /// Unique key column, created as the target primary key.
    pub unique_key: String,
}

/// One source table and the target table created for it.
#[derive(Debug, Clone)]
pub struct CreateTableEntry {
    pub source_schema: String,
    pub source_table: TableName,
    pub target_schema: String,
    pub target_table: TableName,
}

fn default_sharding_count() -> u32 {
    1
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}
