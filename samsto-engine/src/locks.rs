//! Per-key async write serialization.
//!
//! Only excludes writers inside one process. Writers in other processes
//! sharing the store still race, last write wins.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of per-key async mutexes. Entries are reclaimed once no task holds
/// or waits on them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds one key's lock until dropped.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        // Clone the mutex out so no map shard stays locked across the await
        let mutex = Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let mut waiter = Waiter {
            owner: self,
            key,
            armed: true,
        };
        let guard = mutex.lock_owned().await;
        waiter.armed = false;
        KeyGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    fn reclaim(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.reclaim(&self.key);
    }
}

/// Reclaims the entry of a `lock` future dropped while still waiting. The
/// pending acquisition, and its clone of the mutex, drops first.
struct Waiter<'a> {
    owner: &'a KeyedLocks,
    key: &'a str,
    armed: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.owner.reclaim(self.key);
        }
    }
}
