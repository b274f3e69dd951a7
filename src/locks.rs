//! Keyed async locks for per-resource mutual exclusion.
//!
//! Assembly must be exclusive per upload session, and storage-mutating
//! operations (update, remove) must be exclusive per artifact. A `LockMap`
//! hands out an owned guard for an arbitrary key; guards for distinct keys
//! never contend.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of independently lockable keys.
#[derive(Debug, Default)]
pub struct LockMap<K> {
    inner: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> LockMap<K> {
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, waiting if another holder exists.
    ///
    /// The guard is owned, so it can be held across await points for the
    /// whole multi-step operation it protects.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(key).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Whether an entry exists for `key`.
    pub async fn contains(&self, key: &K) -> bool {
        self.inner.lock().await.contains_key(key)
    }

    /// Drop the lock entry for `key` if no one currently holds it.
    ///
    /// Entries accumulate per key; callers that retire a key (e.g. a
    /// completed session) can release its slot.
    pub async fn forget(&self, key: &K) {
        let mut map = self.inner.lock().await;
        if let Some(entry) = map.get(key) {
            if entry.try_lock().is_ok() {
                map.remove(key);
            }
        }
    }
}
