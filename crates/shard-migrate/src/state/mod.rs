//! Job item progress and its persistence backends.
//!
//! A job item's progress records its [`JobStatus`] plus the inventory and
//! incremental positions produced by prepare, so a restarted worker reuses
//! the same task manifest.
//!
//! Backends implement [`ProgressStore`]:
//!
//! - [`MemoryProgressStore`]: process-local, for tests and single-process runs
//! - [`FileProgressStore`]: one HMAC-signed JSON file per job item
//! - [`DbProgressStore`]: PostgreSQL table shared by every worker

mod backend;
mod db;
mod file;
mod memory;

pub use backend::{job_status_to_str, str_to_job_status, ProgressStore};
pub use db::DbProgressStore;
pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::position::{IncrementalPosition, IngestPosition};
use crate::core::schema::TableName;

/// Lifecycle state of one job item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Preparing,
    PrepareSuccess,
    PreparingFailure,
    ExecuteInventoryTask,
    ExecuteIncrementalTask,
    Finished,
    ExecuteFailure,
    Stopping,
}

impl JobStatus {
    /// Whether the one-time target preparation still has to run.
    pub fn needs_prepare(&self) -> bool {
        matches!(
            self,
            JobStatus::Preparing | JobStatus::Running | JobStatus::PreparingFailure
        )
    }

    /// Whether some worker already completed the one-time target preparation.
    pub fn is_prepared(&self) -> bool {
        matches!(
            self,
            JobStatus::PrepareSuccess
                | JobStatus::ExecuteInventoryTask
                | JobStatus::ExecuteIncrementalTask
                | JobStatus::Finished
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(job_status_to_str(*self))
    }
}

/// Persisted progress of one job item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItemProgress {
    pub status: JobStatus,

    /// Positions per actual table (lowercased name), indexed by shard index.
    #[serde(default)]
    pub inventory: BTreeMap<String, Vec<IngestPosition>>,

    /// Change-capture resume point, when the source supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<IncrementalPosition>,

    pub updated_at: DateTime<Utc>,
}

impl JobItemProgress {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            inventory: BTreeMap::new(),
            incremental: None,
            updated_at: Utc::now(),
        }
    }

    /// Record written by a job-wide status update for an item that never ran.
    pub fn status_only(status: JobStatus) -> Self {
        Self::new(status)
    }

    /// Stored positions of an actual table, if this record covers it.
    pub fn inventory_positions(&self, table: &TableName) -> Option<&Vec<IngestPosition>> {
        self.inventory.get(table.lowercase())
    }

    pub fn set_inventory_positions(&mut self, table: &TableName, positions: Vec<IngestPosition>) {
        self.inventory.insert(table.lowercase().to_string(), positions);
    }

    /// Whether the record carries any positions at all.
    pub fn has_positions(&self) -> bool {
        !self.inventory.is_empty() || self.incremental.is_some()
    }
}
