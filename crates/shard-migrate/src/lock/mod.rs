//! Named exclusive locks coordinating workers of the same job.
//!
//! - [`InMemoryLockService`]: workers inside one process
//! - [`PgAdvisoryLockService`]: workers sharing a PostgreSQL database

mod memory;
mod postgres;

pub use memory::InMemoryLockService;
pub use postgres::PgAdvisoryLockService;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A named exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockDefinition {
    name: String,
}

impl LockDefinition {
    pub fn exclusive(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Distributed mutual exclusion.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Wait up to `timeout` for the lock. `Ok(false)` means it was not acquired.
    async fn try_lock(&self, lock: &LockDefinition, timeout: Duration) -> Result<bool>;

    /// Release a lock held by this service. Releasing an unheld lock is a no-op.
    async fn unlock(&self, lock: &LockDefinition) -> Result<()>;
}
