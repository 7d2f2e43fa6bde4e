//! Keyed Locks
//!
//! Exclusive sections per request name. Locks are created on first use and
//! dropped from the map once no holder or waiter is left, so distinct names
//! never contend and the map does not grow with every request ever seen.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily populated map of per-key async mutexes
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        // declared before the acquisition so a waiter dropped mid-wait
        // releases its reference first and still prunes the entry
        let mut section = KeyedGuard {
            locks: self,
            key: key.to_string(),
            guard: None,
        };

        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        section.guard = Some(mutex.lock_owned().await);
        section
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive section of one key, released on drop
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // release before checking whether anyone else still references the lock
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
