//! PostgreSQL advisory lock service.
//!
//! Session-level advisory locks belong to the connection that took them, so
//! the connection is taken out of the pool and kept until unlock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{LockDefinition, LockService};
use crate::error::{MigrateError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Lock service using `pg_try_advisory_lock`, shared by every process on the database.
pub struct PgAdvisoryLockService {
    pool: Pool,
    held: Mutex<HashMap<String, Object>>,
    poll_interval: Duration,
}

impl PgAdvisoryLockService {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// 64-bit advisory key derived from the lock name.
    pub fn lock_key(name: &str) -> i64 {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(bytes)
    }
}

#[async_trait]
impl LockService for PgAdvisoryLockService {
    async fn try_lock(&self, lock: &LockDefinition, timeout: Duration) -> Result<bool> {
        let key = Self::lock_key(lock.name());
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting connection for advisory lock"))?;

        let deadline = Instant::now() + timeout;
        loop {
            let row = client
                .query_one("SELECT pg_try_advisory_lock($1)", &[&key])
                .await?;
            let acquired: bool = row.get(0);
            if acquired {
                debug!("Acquired advisory lock {} (key {})", lock.name(), key);
                self.held.lock().await.insert(lock.name().to_string(), client);
                return Ok(true);
            }
            if Instant::now() + self.poll_interval > deadline {
                debug!("Timed out after {:?} waiting for advisory lock {}", timeout, lock.name());
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn unlock(&self, lock: &LockDefinition) -> Result<()> {
        let client = self.held.lock().await.remove(lock.name());
        let Some(client) = client else {
            return Ok(());
        };

        let key = Self::lock_key(lock.name());
        let row = match client
            .query_one("SELECT pg_advisory_unlock($1)", &[&key])
            .await
        {
            Ok(row) => row,
            Err(e) => {
                // The session may still hold the lock: close it instead of returning it to the pool
                warn!("Discarding connection of advisory lock {}: {}", lock.name(), e);
                drop(Object::take(client));
                return Err(e.into());
            }
        };
        let released: bool = row.get(0);
        if !released {
            warn!("Advisory lock {} was not held by its connection", lock.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::DataSourceConfig;
    use crate::drivers::postgres::connect_pool;

    fn get_test_config() -> DataSourceConfig {
        DataSourceConfig {
            r#type: "postgres".to_string(),
            host: std::env::var("PG_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: 5432,
            database: std::env::var("PG_DATABASE").unwrap_or_else(|_| "postgres".to_string()),
            user: std::env::var("PG_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("PG_PASSWORD").unwrap_or_default(),
            schema: "public".to_string(),
            ssl_mode: "disable".to_string(),
        }
    }

    /// Needs a live PostgreSQL.
    #[tokio::test]
    #[ignore] // Run with --ignored flag
    async fn test_failed_unlock_discards_session() {
        let pool = connect_pool(&get_test_config(), 4).expect("Failed to build pool");
        let service = PgAdvisoryLockService::new(pool.clone());
        let lock = LockDefinition::exclusive("prepare-unlock-failure");
        assert!(service.try_lock(&lock, Duration::from_secs(1)).await.unwrap());

        let pid: i32 = {
            let held = service.held.lock().await;
            let client = held.get(lock.name()).expect("lock connection kept");
            client.query_one("SELECT pg_backend_pid()", &[]).await.unwrap().get(0)
        };
        let admin = pool.get().await.unwrap();
        admin
            .execute("SELECT pg_terminate_backend($1)", &[&pid])
            .await
            .unwrap();
        drop(admin);

        assert!(service.unlock(&lock).await.is_err());
        assert_eq!(pool.status().size, 1);

        // A fresh session must not re-enter a lock left behind by the dead one
        let other = PgAdvisoryLockService::new(pool.clone());
        assert!(other.try_lock(&lock, Duration::from_secs(1)).await.unwrap());
        other.unlock(&lock).await.unwrap();
    }

    #[test]
    fn test_lock_key_is_stable() {
        let a = PgAdvisoryLockService::lock_key("prepare-j1");
        assert_eq!(a, PgAdvisoryLockService::lock_key("prepare-j1"));
        assert_ne!(a, PgAdvisoryLockService::lock_key("prepare-j2"));
    }
}
