//! Test doubles for the preparer's collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{
    CreateTableConfiguration, DataSourceConfig, DumperConfiguration, ImporterConfiguration,
    JobConfiguration, ProcessConfig,
};
use crate::core::position::IncrementalPosition;
use crate::core::schema::{Column, TableMapping, UniqueKeyColumn};
use crate::core::traits::{
    IncrementalPositionManager, JobRegistry, MetadataLoader, SourceDataSource, TargetPreparer,
};
use crate::error::{MigrateError, Result};
use crate::lock::{InMemoryLockService, LockDefinition, LockService};
use crate::prepare::{InventoryDumperConfiguration, JobItemContext, JobProcessContext, MigrationJobPreparer};
use crate::state::{JobItemProgress, MemoryProgressStore};
use crate::task::{Dumper, Importer, IngestFactory, Record};

/// Source whose table holds a sorted set of integer keys.
pub struct FakeSource {
    keys: Vec<i64>,
    stuck_end: Option<i64>,
    columns: Vec<Column>,
    fail_queries: AtomicBool,
    pub range_queries: AtomicUsize,
    pub min_queries: AtomicUsize,
}

impl FakeSource {
    pub fn with_keys(keys: impl IntoIterator<Item = i64>) -> Self {
        let mut keys: Vec<i64> = keys.into_iter().collect();
        keys.sort_unstable();
        Self {
            keys,
            stuck_end: None,
            columns: Vec::new(),
            fail_queries: AtomicBool::new(false),
            range_queries: AtomicUsize::new(0),
            min_queries: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::with_keys(Vec::new())
    }

    /// Every range query answers the same end value.
    pub fn stuck_at(end: i64) -> Self {
        Self {
            stuck_end: Some(end),
            ..Self::empty()
        }
    }

    /// Reachable, but every key query fails.
    pub fn failing() -> Self {
        let source = Self::empty();
        source.fail_queries.store(true, Ordering::SeqCst);
        source
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(MigrateError::query("fake source", "connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceDataSource for FakeSource {
    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn query_range_end(&self, _sql: &str, begin: i64, size: i64) -> Result<Option<i64>> {
        self.range_queries.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        if let Some(end) = self.stuck_end {
            return Ok(Some(end));
        }
        Ok(self
            .keys
            .iter()
            .filter(|k| **k >= begin)
            .take(size as usize)
            .last()
            .copied())
    }

    async fn query_min_key(&self, _sql: &str) -> Result<Option<i64>> {
        self.min_queries.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.keys.first().copied())
    }

    fn name(&self) -> &str {
        "ds_0"
    }
}

#[async_trait]
impl MetadataLoader for FakeSource {
    async fn load_columns(&self, _schema: &str, _table: &str) -> Result<Vec<Column>> {
        Ok(self.columns.clone())
    }
}

pub fn column(name: &str, data_type: &str) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: false,
        is_primary_key: true,
        ordinal_pos: 1,
    }
}

/// Target preparer counting its calls and recording the tables it touched.
#[derive(Default)]
pub struct CountingTarget {
    pub schema_calls: AtomicUsize,
    pub table_calls: AtomicUsize,
    pub check_calls: AtomicUsize,
    pub ddl_delay: Duration,
    created: Mutex<Vec<String>>,
    checked: Mutex<Vec<String>>,
}

impl CountingTarget {
    pub fn slow(ddl_delay: Duration) -> Self {
        Self {
            ddl_delay,
            ..Self::default()
        }
    }

    /// Target tables passed to `prepare_target_tables`, sorted.
    pub fn created_tables(&self) -> Vec<String> {
        sorted(&self.created)
    }

    /// Target tables passed to `check_target_tables`, sorted.
    pub fn checked_tables(&self) -> Vec<String> {
        sorted(&self.checked)
    }
}

fn sorted(names: &Mutex<Vec<String>>) -> Vec<String> {
    let mut names = names.lock().unwrap().clone();
    names.sort();
    names.dedup();
    names
}

#[async_trait]
impl TargetPreparer for CountingTarget {
    async fn prepare_target_schemas(&self, _config: &CreateTableConfiguration) -> Result<()> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn prepare_target_tables(&self, config: &CreateTableConfiguration) -> Result<()> {
        self.table_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().extend(
            config
                .entries
                .iter()
                .map(|e| e.target_table.original().to_string()),
        );
        if !self.ddl_delay.is_zero() {
            tokio::time::sleep(self.ddl_delay).await;
        }
        Ok(())
    }

    async fn check_target_tables(&self, config: &ImporterConfiguration) -> Result<()> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.checked
            .lock()
            .unwrap()
            .extend(config.tables.iter().map(|t| t.original().to_string()));
        Ok(())
    }
}

/// Incremental position manager handing out a fixed WAL position.
#[derive(Default)]
pub struct FakePositions {
    pub init_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub fail_destroy: bool,
}

#[async_trait]
impl IncrementalPositionManager for FakePositions {
    async fn init_position(&self, job: &JobConfiguration, shard_item: u32) -> Result<IncrementalPosition> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if job.source.r#type == "mysql" {
            return Ok(IncrementalPosition::MysqlBinlog {
                file: "binlog.000003".to_string(),
                position: 4 + u64::from(shard_item),
            });
        }
        Ok(IncrementalPosition::PostgresWal {
            slot: format!("slot_{}_{}", job.job_id, shard_item),
            lsn: "0/16B3748".to_string(),
        })
    }

    async fn destroy_position(
        &self,
        _job_id: &str,
        _shard_item: u32,
        _source: &DataSourceConfig,
    ) -> Result<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_destroy {
            return Err(MigrateError::query("dropping slot", "slot is active"));
        }
        Ok(())
    }
}

/// Registry counting stop requests.
#[derive(Default)]
pub struct CountingRegistry {
    pub stops: AtomicUsize,
}

#[async_trait]
impl JobRegistry for CountingRegistry {
    async fn stop(&self, _job_id: &str) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lock service that never grants the lock.
pub struct BusyLock;

#[async_trait]
impl LockService for BusyLock {
    async fn try_lock(&self, _lock: &LockDefinition, _timeout: Duration) -> Result<bool> {
        Ok(false)
    }

    async fn unlock(&self, _lock: &LockDefinition) -> Result<()> {
        Ok(())
    }
}

/// Ingest whose dumpers emit a fixed number of rows and whose importers count them.
pub struct CountingIngest {
    pub rows_per_dumper: u64,
}

struct FixedDumper {
    table: String,
    rows: u64,
}

#[async_trait]
impl Dumper for FixedDumper {
    async fn run(&self, tx: mpsc::Sender<Record>, cancel: CancellationToken) -> Result<()> {
        for i in 0..self.rows {
            if cancel.is_cancelled() {
                break;
            }
            let record = Record::Data {
                table: self.table.clone(),
                payload: i.to_be_bytes().to_vec(),
            };
            if tx.send(record).await.is_err() {
                break;
            }
        }
        let _ = tx.send(Record::Finished).await;
        Ok(())
    }
}

struct CountingImporter;

#[async_trait]
impl Importer for CountingImporter {
    async fn run(&self, mut rx: mpsc::Receiver<Record>, _cancel: CancellationToken) -> Result<u64> {
        let mut count = 0;
        while let Some(record) = rx.recv().await {
            match record {
                Record::Data { .. } => count += 1,
                Record::Finished => break,
            }
        }
        Ok(count)
    }
}

impl IngestFactory for CountingIngest {
    fn inventory_dumper(&self, config: &InventoryDumperConfiguration) -> Result<Box<dyn Dumper>> {
        Ok(Box::new(FixedDumper {
            table: config.actual_table.to_string(),
            rows: self.rows_per_dumper,
        }))
    }

    fn incremental_dumper(
        &self,
        config: &DumperConfiguration,
        _position: &IncrementalPosition,
    ) -> Result<Box<dyn Dumper>> {
        Ok(Box::new(FixedDumper {
            table: config.data_source_name.clone(),
            rows: self.rows_per_dumper,
        }))
    }

    fn importer(&self, _config: &ImporterConfiguration) -> Result<Box<dyn Importer>> {
        Ok(Box::new(CountingImporter))
    }
}

pub fn data_source(db_type: &str, host: &str) -> DataSourceConfig {
    DataSourceConfig {
        r#type: db_type.to_string(),
        host: host.to_string(),
        port: 5432,
        database: "shop".to_string(),
        user: "app".to_string(),
        password: "secret".to_string(),
        schema: "public".to_string(),
        ssl_mode: "disable".to_string(),
    }
}

/// Job over `tables` (actual, logic) split by `order_id`.
pub fn job_config(
    sharding_count: u32,
    tables: &[(&str, &str)],
    key_type: Option<&str>,
) -> JobConfiguration {
    JobConfiguration {
        job_id: "j1".to_string(),
        sharding_count,
        source: data_source("postgres", "src"),
        target: data_source("postgres", "dst"),
        tables: tables
            .iter()
            .map(|(actual, logic)| TableMapping::new(*actual, *logic))
            .collect(),
        unique_key: UniqueKeyColumn {
            name: "order_id".to_string(),
            data_type: key_type.map(str::to_string),
        },
        process: ProcessConfig {
            sharding_size: Some(1000),
            ..ProcessConfig::default()
        },
    }
}

pub fn context(
    job: Arc<JobConfiguration>,
    shard_item: u32,
    source: Arc<FakeSource>,
    init_progress: Option<JobItemProgress>,
) -> JobItemContext {
    let process = Arc::new(JobProcessContext::new(
        job.process.clone(),
        Arc::new(CountingIngest { rows_per_dumper: 3 }),
    ));
    JobItemContext::new(
        job,
        shard_item,
        process,
        source.clone(),
        source,
        init_progress,
    )
    .unwrap()
}

/// Preparer wired to in-memory collaborators, with handles on each fake.
pub struct Harness {
    pub store: Arc<MemoryProgressStore>,
    pub target: Arc<CountingTarget>,
    pub positions: Arc<FakePositions>,
    pub registry: Arc<CountingRegistry>,
    pub preparer: Arc<MigrationJobPreparer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(
            Arc::new(InMemoryLockService::new()),
            CountingTarget::default(),
            FakePositions::default(),
        )
    }

    pub fn build(lock: Arc<dyn LockService>, target: CountingTarget, positions: FakePositions) -> Self {
        let store = Arc::new(MemoryProgressStore::new());
        let target = Arc::new(target);
        let positions = Arc::new(positions);
        let registry = Arc::new(CountingRegistry::default());
        let preparer = Arc::new(MigrationJobPreparer::new(
            store.clone(),
            lock,
            target.clone(),
            positions.clone(),
            registry.clone(),
        ));
        Self {
            store,
            target,
            positions,
            registry,
            preparer,
        }
    }
}
