//! Shared-store abstraction.
//!
//! The backing store is the synchronization point shared by every process
//! using the cache. Implementations must make each operation individually
//! atomic - in particular `write_if_absent`, which the locking layers rely
//! on - but no cross-key transactions are assumed.
//!
//! [`MemoryStore`] is the reference implementation, used in tests and in
//! single-process deployments. A networked implementation (e.g. backed by
//! Redis) is user-supplied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Key-value store with per-key TTLs.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Read the live value for `key`, or `None` if absent or expired.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value, replacing any existing one. `ttl: None` means no
    /// store-level expiry.
    async fn write(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Atomically create the key only if no live value exists. Returns
    /// `true` iff this call created it. This must be a single atomic store
    /// operation, never a read followed by a write.
    async fn write_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Delete the key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete every key starting with `prefix`; returns how many were
    /// removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;
}

// ============================================================================
// VALUE CODEC
// ============================================================================

/// Serialize a cached value for the store.
pub(crate) fn encode_value<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Deserialize a cached value. Malformed bytes are a cache miss, not an
/// error: the caller falls through to a fetch.
pub(crate) fn decode_value<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key, error = %e, "Discarding malformed cache record");
            None
        }
    }
}

// ============================================================================
// IN-MEMORY REFERENCE IMPLEMENTATION
// ============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now <= expires_at,
            None => true,
        }
    }
}

/// In-memory [`SharedStore`] with lazy expiry.
///
/// Expired values are skipped on read and overwritten by `write_if_absent`;
/// they are physically removed only when deleted or replaced.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|ttl| {
            Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
        })
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|v| v.is_live(Utc::now()))
            .map(|v| v.data.clone()))
    }

    async fn write(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        values.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(())
    }

    async fn write_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        // The whole check-and-insert runs under one write lock, which is
        // what makes this atomic for in-process racers.
        let mut values = self.values.write().await;
        if let Some(existing) = values.get(key) {
            if existing.is_live(Utc::now()) {
                return Ok(false);
            }
        }
        values.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        values.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut values = self.values.write().await;
        let before = values.len();
        values.retain(|key, _| !key.starts_with(prefix));
        Ok((before - values.len()) as u64)
    }
}
