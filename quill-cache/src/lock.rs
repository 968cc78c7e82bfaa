//! Distributed lock over the shared store.
//!
//! A lock is a presence-only key created with the store's atomic
//! `write_if_absent`. At most one holder exists per key at any instant; the
//! TTL frees the key if the holder crashes without releasing.

use crate::store::SharedStore;
use quill_core::StoreError;
use std::sync::Arc;
use std::time::Duration;

/// Payload stored under a lock key. The value is never read; only the key's
/// presence matters.
const LOCK_PAYLOAD: &[u8] = b"1";

/// Key under which population of `cache_key` is serialized.
pub fn population_lock_key(cache_key: &str) -> String {
    format!("lock:{cache_key}")
}

/// Key that deduplicates background refreshes of `cache_key`.
pub fn refresh_lock_key(cache_key: &str) -> String {
    format!("refreshing:{cache_key}")
}

/// Mutual exclusion across processes, backed by the shared store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn SharedStore>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Try to take the lock. Returns `true` iff this call created the key.
    ///
    /// A store outage propagates as an error; it is never reported as the
    /// lock having been acquired.
    pub async fn acquire(&self, lock_key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.store
            .write_if_absent(lock_key, LOCK_PAYLOAD.to_vec(), Some(ttl))
            .await
    }

    /// Release the lock unconditionally.
    ///
    /// Callers must invoke this on every exit path of their critical
    /// section, success or failure; the TTL only covers crashed holders.
    pub async fn release(&self, lock_key: &str) -> Result<(), StoreError> {
        self.store.delete(lock_key).await
    }
}
