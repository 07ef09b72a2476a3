//! Process-local lock service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{LockDefinition, LockService};
use crate::error::Result;

/// Locks backed by one tokio mutex per name; the owned guard is kept until unlock.
#[derive(Default)]
pub struct InMemoryLockService {
    mutexes: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    held: std::sync::Mutex<HashMap<String, OwnedMutexGuard<()>>>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut mutexes = self.mutexes.lock().unwrap_or_else(|e| e.into_inner());
        mutexes
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn try_lock(&self, lock: &LockDefinition, timeout: Duration) -> Result<bool> {
        let mutex = self.mutex_for(lock.name());
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                self.held
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(lock.name().to_string(), guard);
                debug!("Acquired lock {}", lock.name());
                Ok(true)
            }
            Err(_) => {
                debug!("Timed out after {:?} waiting for lock {}", timeout, lock.name());
                Ok(false)
            }
        }
    }

    async fn unlock(&self, lock: &LockDefinition) -> Result<()> {
        let guard = self
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(lock.name());
        if guard.is_some() {
            debug!("Released lock {}", lock.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_unlocked() {
        let service = InMemoryLockService::new();
        let lock = LockDefinition::exclusive("prepare-j1");

        assert!(service.try_lock(&lock, Duration::from_millis(50)).await.unwrap());
        assert!(!service.try_lock(&lock, Duration::from_millis(50)).await.unwrap());

        service.unlock(&lock).await.unwrap();
        assert!(service.try_lock(&lock, Duration::from_millis(50)).await.unwrap());
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_contend() {
        let service = InMemoryLockService::new();
        let a = LockDefinition::exclusive("prepare-a");
        let b = LockDefinition::exclusive("prepare-b");
        assert!(service.try_lock(&a, Duration::from_millis(10)).await.unwrap());
        assert!(service.try_lock(&b, Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let service = Arc::new(InMemoryLockService::new());
        let lock = LockDefinition::exclusive("prepare-j1");
        assert!(service.try_lock(&lock, Duration::from_millis(10)).await.unwrap());

        let waiter = {
            let service = service.clone();
            let lock = lock.clone();
            tokio::spawn(async move { service.try_lock(&lock, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.unlock(&lock).await.unwrap();

        assert!(waiter.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_unlock_unheld_is_noop() {
        let service = InMemoryLockService::new();
        service
            .unlock(&LockDefinition::exclusive("never-held"))
            .await
            .unwrap();
    }
}
