//! Per-owner concurrency control.
//!
//! An owner has at most one method session, so the owner id is the lock key.
//! Every mutating controller operation holds the owner's permit for its
//! whole duration, including engine work on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use st_domain::error::{Error, Result};

/// Maps each owner to a `Semaphore(1)`.
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for the owner's permit. It is released on drop.
    pub async fn acquire(&self, owner: &str) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(owner.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("lock for owner {owner} was closed")))
    }

    /// Whether someone currently holds the owner's permit.
    pub fn is_held(&self, owner: &str) -> bool {
        self.locks
            .lock()
            .get(owner)
            .is_some_and(|sem| sem.available_permits() == 0)
    }

    /// Number of tracked owners (for monitoring).
    pub fn owner_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Forget owners whose lock is neither held nor awaited.
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        // The map holds one reference; anything more is a permit or a waiter.
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
        before - locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = SessionLockMap::new();

        let permit1 = map.acquire("alice").await.unwrap();
        drop(permit1);

        let permit2 = map.acquire("alice").await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_owners_run_concurrently() {
        let map = Arc::new(SessionLockMap::new());

        let p1 = map.acquire("alice").await.unwrap();
        let p2 = map.acquire("bob").await.unwrap();
        assert_eq!(map.owner_count(), 2);

        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_owner_waits() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();

        let p1 = map.acquire("alice").await.unwrap();

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("alice").await.unwrap();
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        drop(p1);
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn held_reflects_the_permit() {
        let map = SessionLockMap::new();
        assert!(!map.is_held("alice"));
        let permit = map.acquire("alice").await.unwrap();
        assert!(map.is_held("alice"));
        assert!(!map.is_held("bob"));
        drop(permit);
        assert!(!map.is_held("alice"));
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = SessionLockMap::new();
        let held = map.acquire("alice").await.unwrap();
        drop(map.acquire("bob").await.unwrap());

        assert_eq!(map.prune_idle(), 1);
        assert_eq!(map.owner_count(), 1);
        drop(held);
        assert_eq!(map.prune_idle(), 1);
        assert_eq!(map.owner_count(), 0);
    }
}
