//! File-backed progress store.
//!
//! Layout: `{dir}/{job_id}/{shard_item}.json`. Each file carries an
//! HMAC-SHA256 signature keyed by the job configuration hash, so a file
//! edited by hand or written for a different configuration is rejected.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::debug;

use super::{JobItemProgress, JobStatus, ProgressStore};
use crate::error::{MigrateError, Result};

type HmacSha256 = Hmac<Sha256>;

/// On-disk form of one job item's progress.
#[derive(Debug, Serialize, Deserialize)]
struct SignedProgress {
    progress: JobItemProgress,
    hmac: String,
}

/// Progress stored as signed JSON files.
pub struct FileProgressStore {
    dir: PathBuf,
    config_hash: String,
    /// Serializes read-modify-write status updates within this process.
    write_lock: Mutex<()>,
}

impl FileProgressStore {
    /// Create a store rooted at `dir`, signing with the job configuration hash.
    pub fn new(dir: impl Into<PathBuf>, config_hash: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            config_hash: config_hash.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn item_path(&self, job_id: &str, shard_item: u32) -> PathBuf {
        self.dir.join(job_id).join(format!("{}.json", shard_item))
    }

    fn compute_hmac(&self, progress: &JobItemProgress) -> Result<String> {
        let content = serde_json::to_string(progress)?;
        let mut mac = HmacSha256::new_from_slice(self.config_hash.as_bytes())
            .map_err(|e| MigrateError::State(format!("Failed to create HMAC: {}", e)))?;
        mac.update(content.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn read(&self, path: &Path) -> Result<Option<JobItemProgress>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let signed: SignedProgress = serde_json::from_str(&content)?;
        if signed.hmac != self.compute_hmac(&signed.progress)? {
            return Err(MigrateError::State(format!(
                "Progress file {} failed integrity check: HMAC mismatch (possible tampering)",
                path.display()
            )));
        }
        Ok(Some(signed.progress))
    }

    /// Atomic write: temp file, then rename.
    async fn write(&self, path: &Path, progress: &JobItemProgress) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let signed = SignedProgress {
            hmac: self.compute_hmac(progress)?,
            progress: progress.clone(),
        };
        let content = serde_json::to_string_pretty(&signed)?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        debug!("Wrote progress file {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn init_schema(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    async fn get_progress(&self, job_id: &str, shard_item: u32) -> Result<Option<JobItemProgress>> {
        self.read(&self.item_path(job_id, shard_item)).await
    }

    async fn persist_progress(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut progress = progress.clone();
        progress.updated_at = Utc::now();
        self.write(&self.item_path(job_id, shard_item), &progress).await
    }

    async fn persist_progress_if_absent(
        &self,
        job_id: &str,
        shard_item: u32,
        progress: &JobItemProgress,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.item_path(job_id, shard_item);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        self.write(&path, progress).await?;
        Ok(true)
    }

    async fn update_status(&self, job_id: &str, shard_item: u32, status: JobStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.item_path(job_id, shard_item);
        let mut progress = self
            .read(&path)
            .await?
            .unwrap_or_else(|| JobItemProgress::status_only(status));
        progress.status = status;
        progress.updated_at = Utc::now();
        self.write(&path, &progress).await
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
