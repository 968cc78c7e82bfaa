//! Process-local bounded TTL cache.
//!
//! Used as the single-process fallback when no shared store is configured.
//! All operations serialize through one mutex; the expected working set is
//! hundreds to low thousands of entries, so the coarse lock and the O(n)
//! eviction scan are acceptable.
//!
//! Expired entries are not removed on read. They stop being returned the
//! moment they expire, but keep occupying a slot until an insert evicts
//! them, [`BoundedTtlCache::cleanup_expired`] runs, or the cache is cleared.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry<T> {
    data: T,
    expires_at: DateTime<Utc>,
}

/// A mutex-guarded TTL map with a hard entry bound.
///
/// When an insert finds the cache full, exactly one entry is evicted first:
/// the one with the earliest expiry. This approximates eviction by freshness
/// rather than by recency of use, and is kept as-is for compatibility with
/// the behavior callers already depend on.
#[derive(Debug)]
pub struct BoundedTtlCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<T: Clone> BoundedTtlCache<T> {
    /// Create a cache holding at most `max_entries` values for `ttl` each.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Get a live value. Expired or unknown keys return `None`; expired
    /// entries are left in place for deferred cleanup.
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if Utc::now() > entry.expires_at {
            return None;
        }
        Some(entry.data.clone())
    }

    /// Insert a value, evicting the earliest-expiring entry first if the
    /// cache is full. Returns the inserted value.
    pub fn set(&self, key: impl Into<String>, value: T) -> T {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.max_entries {
                evict_earliest(&mut entries);
            }
            let expires_at = Utc::now()
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
            entries.insert(
                key.into(),
                Entry {
                    data: value.clone(),
                    expires_at,
                },
            );
        }
        value
    }

    /// Remove every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Remove every expired entry and return how many were removed.
    ///
    /// Not invoked internally; meant to be called by an external periodic
    /// scheduler.
    pub fn cleanup_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    /// Number of occupied slots, including not-yet-cleaned expired entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remove the single entry with the earliest expiry.
fn evict_earliest<T>(entries: &mut HashMap<String, Entry<T>>) {
    let earliest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = earliest {
        entries.remove(&key);
    }
}
