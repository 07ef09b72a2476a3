//! Logical replication slots as incremental positions.
//!
//! Each shard item owns one slot on its source, since a logical slot serves a
//! single consumer. Creating the slot pins the WAL at the point the item's
//! inventory snapshot starts; dropping it releases that WAL.

use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};

use crate::config::{DataSourceConfig, JobConfiguration};
use crate::core::position::IncrementalPosition;
use crate::core::traits::IncrementalPositionManager;
use crate::drivers::postgres::connect_pool;
use crate::error::{MigrateError, Result};

const SLOT_PREFIX: &str = "shard_migrate_";
const OUTPUT_PLUGIN: &str = "pgoutput";

/// PostgreSQL slot names allow at most 63 bytes.
const MAX_SLOT_NAME_LEN: usize = 63;

const EXISTING_SLOT_SQL: &str = "SELECT COALESCE(confirmed_flush_lsn, restart_lsn)::text \
                                 FROM pg_replication_slots WHERE slot_name = $1";

/// Creates and drops a logical replication slot per shard item.
#[derive(Debug, Clone, Default)]
pub struct PgReplicationSlotManager;

impl PgReplicationSlotManager {
    pub fn new() -> Self {
        Self
    }

    /// Slot name for a shard item: lowercase alphanumerics and underscores only.
    ///
    /// Long job ids are truncated so the item suffix always survives.
    pub fn slot_name(job_id: &str, shard_item: u32) -> String {
        let suffix = format!("_{}", shard_item);
        let mut sanitized: String = job_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        sanitized.truncate(MAX_SLOT_NAME_LEN - SLOT_PREFIX.len() - suffix.len());
        format!("{}{}{}", SLOT_PREFIX, sanitized, suffix)
    }

    async fn client(source: &DataSourceConfig) -> Result<deadpool_postgres::Object> {
        let pool = connect_pool(source, 1)?;
        pool.get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting replication connection"))
    }

    async fn existing_lsn(client: &deadpool_postgres::Object, slot: &str) -> Result<Option<String>> {
        let row = client.query_opt(EXISTING_SLOT_SQL, &[&slot]).await?;
        Ok(row.map(|row| row.get::<_, Option<String>>(0).unwrap_or_default()))
    }
}

#[async_trait]
impl IncrementalPositionManager for PgReplicationSlotManager {
    async fn init_position(&self, job: &JobConfiguration, shard_item: u32) -> Result<IncrementalPosition> {
        let slot = Self::slot_name(&job.job_id, shard_item);
        let client = Self::client(&job.source).await?;

        // Reuse an existing slot so a restarted prepare keeps its original start point
        if let Some(lsn) = Self::existing_lsn(&client, &slot).await? {
            debug!("Reusing replication slot {} at {}", slot, lsn);
            return Ok(IncrementalPosition::PostgresWal { slot, lsn });
        }

        let created = client
            .query_one(
                "SELECT lsn::text FROM pg_create_logical_replication_slot($1, $2)",
                &[&slot, &OUTPUT_PLUGIN],
            )
            .await;
        let lsn: String = match created {
            Ok(row) => row.get(0),
            // Lost a creation race with another prepare of the same item
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_OBJECT) => {
                match Self::existing_lsn(&client, &slot).await? {
                    Some(lsn) => lsn,
                    None => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "Created replication slot {} at {} for job {} item {}",
            slot, lsn, job.job_id, shard_item
        );
        Ok(IncrementalPosition::PostgresWal { slot, lsn })
    }

    async fn destroy_position(
        &self,
        job_id: &str,
        shard_item: u32,
        source: &DataSourceConfig,
    ) -> Result<()> {
        let slot = Self::slot_name(job_id, shard_item);
        let client = Self::client(source).await?;
        let dropped = client
            .execute(
                "SELECT pg_drop_replication_slot(slot_name) \
                 FROM pg_replication_slots WHERE slot_name = $1",
                &[&slot],
            )
            .await?;
        if dropped > 0 {
            info!("Dropped replication slot {}", slot);
        }
        Ok(())
    }
}
