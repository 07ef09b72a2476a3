//! Database-backed progress storage.
//!
//! Stores job item progress in PostgreSQL within the `_shard_migrate` schema.
//! This is preferred over file-based progress when several workers share a job:
//! - Transactional safety
//! - Multi-instance coordination
//! - No shared file system required

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;

use super::{job_status_to_str, str_to_job_status, JobItemProgress, JobStatus, ProgressStore};
use crate::error::{MigrateError, Result};

/// PostgreSQL progress store.
pub struct DbProgressStore {
    pool: Pool,
    schema: String,
}

impl DbProgressStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            schema: "_shard_migrate".to_string(),
        }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting progress store connection"))
    }

    fn decode(status: &str, body: &str, updated_at: DateTime<Utc>) -> Result<JobItemProgress> {
        let mut progress: JobItemProgress = serde_json::from_str(body)?;
        // The status column is authoritative; update_status only touches it
        progress.status = str_to_job_status(status)?;
        progress.updated_at = updated_at;
        Ok(progress)
    }
}

#[async_trait]
impl ProgressStore for DbProgressStore {
    async fn init_schema(&self) -> Result<()> {
        let conn = self.client().await?;

        conn.execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema), &[])
            .await?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}.job_item_progress (
                    job_id TEXT NOT NULL,
                    shard_item INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    progress TEXT NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (job_id, shard_item)
                )",
                self.schema
            ),
            &[],
        )
        .await?;

        Ok(())
    }

    async fn get_progress(&self, job_id: &str, shard_item: u32) -> Result<Option<JobItemProgress>> {
        let conn = self.client().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT status, progress, updated_at FROM {}.job_item_progress
                     WHERE job_id = $1 AND shard_item = $2",
                    self.schema
                ),
                &[&job_id, &(shard_item as i32)],
            )
            .await?;

        match row {
            Some(row) => {
                let status: String = row.get(0);
                let body: String = row.get(1);
                let updated_at: DateTime<Utc> = row.get(2);
                Ok(Some(Self::decode(&status, &body, updated_at)?))
            }
            None => Ok(None),
        }
    }

    async fn persist_progress(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<()> {
        let conn = self.client().await?;
        let body = serde_json::to_string(progress)?;
        conn.execute(
            &format!(
                "INSERT INTO {}.job_item_progress (job_id, shard_item, status, progress, updated_at)
                 VALUES ($1, $2, $3, $4, NOW())
                 ON CONFLICT (job_id, shard_item) DO UPDATE SET
                    status = EXCLUDED.status,
                    progress = EXCLUDED.progress,
                    updated_at = NOW()",
                self.schema
            ),
            &[
                &job_id,
                &(shard_item as i32),
                &job_status_to_str(progress.status),
                &body,
            ],
        )
        .await?;
        Ok(())
    }

    async fn persist_progress_if_absent(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<bool> {
        let conn = self.client().await?;
        let body = serde_json::to_string(progress)?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO {}.job_item_progress (job_id, shard_item, status, progress, updated_at)
                     VALUES ($1, $2, $3, $4, NOW())
                     ON CONFLICT (job_id, shard_item) DO NOTHING",
                    self.schema
                ),
                &[
                    &job_id,
                    &(shard_item as i32),
                    &job_status_to_str(progress.status),
                    &body,
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    async fn update_status(&self, job_id: &str, shard_item: u32, status: JobStatus) -> Result<()> {
        let mut conn = self.client().await?;
        let tx = conn.transaction().await?;

        // Status-only record for items that never wrote progress
        let body = serde_json::to_string(&JobItemProgress::status_only(status))?;
        tx.execute(
            &format!(
                "INSERT INTO {}.job_item_progress (job_id, shard_item, status, progress, updated_at)
                 VALUES ($1, $2, $3, $4, NOW())
                 ON CONFLICT (job_id, shard_item) DO NOTHING",
                self.schema
            ),
            &[&job_id, &(shard_item as i32), &job_status_to_str(status), &body],
        )
        .await?;

        tx.execute(
            &format!(
                "UPDATE {}.job_item_progress SET status = $3, updated_at = NOW()
                 WHERE job_id = $1 AND shard_item = $2",
                self.schema
            ),
            &[&job_id, &(shard_item as i32), &job_status_to_str(status)],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
