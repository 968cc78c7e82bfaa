//! Stale-while-revalidate read-through.
//!
//! Every cached value carries two timestamps that split its lifetime into
//! three windows: FRESH (serve immediately), REVALIDATE (serve immediately
//! and refresh in the background), and STALE (block on a synchronous
//! refetch, exactly like a miss). The envelope is persisted in the shared
//! store as one serialized record, so every process observes the same state
//! transitions.
//!
//! Background refreshes are deduplicated by a short-lived per-key lock in
//! the store and executed on the bounded refresh pool; the caller on the
//! REVALIDATE path never waits on the refresh outcome.

use crate::config::CacheConfig;
use crate::fetcher::Fetcher;
use crate::lock::{refresh_lock_key, DistributedLock};
use crate::refresh::RefreshPool;
use crate::store::{decode_value, encode_value, SharedStore};
use chrono::{DateTime, Utc};
use quill_core::{QuillError, QuillResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// ENVELOPE
// ============================================================================

/// Lifecycle window of an envelope at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwrState {
    /// Before `fresh_until`: serve as-is.
    Fresh,
    /// Between `fresh_until` and `stale_until`: serve, refresh behind.
    Revalidate,
    /// At or past `stale_until`: too old to serve.
    Stale,
}

/// A cached value plus its freshness metadata, stored as one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwrEnvelope<T> {
    pub data: T,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
}

impl<T> SwrEnvelope<T> {
    /// Build an envelope anchored at `now`. `stale_until` is always
    /// `fresh_until` plus the grace period, so the ordering invariant holds
    /// by construction.
    pub fn build(data: T, now: DateTime<Utc>, fresh_ttl: Duration, stale_grace: Duration) -> Self {
        let fresh_until =
            now + chrono::Duration::from_std(fresh_ttl).unwrap_or(chrono::Duration::zero());
        let stale_until = fresh_until
            + chrono::Duration::from_std(stale_grace).unwrap_or(chrono::Duration::zero());
        Self {
            data,
            fresh_until,
            stale_until,
        }
    }

    /// Classify which window `now` falls into.
    pub fn state(&self, now: DateTime<Utc>) -> SwrState {
        if now < self.fresh_until {
            SwrState::Fresh
        } else if now < self.stale_until {
            SwrState::Revalidate
        } else {
            SwrState::Stale
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stale-while-revalidate read-through over the shared store.
#[derive(Clone)]
pub struct SwrFetch {
    store: Arc<dyn SharedStore>,
    lock: DistributedLock,
    pool: Arc<RefreshPool>,
    stale_grace: Duration,
    config: CacheConfig,
}

impl SwrFetch {
    pub fn new(
        store: Arc<dyn SharedStore>,
        pool: Arc<RefreshPool>,
        stale_grace: Duration,
        config: CacheConfig,
    ) -> Self {
        let lock = DistributedLock::new(Arc::clone(&store));
        Self {
            store,
            lock,
            pool,
            stale_grace,
            config,
        }
    }

    /// Fetch `cache_key`, serving expired-but-not-stale data immediately and
    /// refreshing it behind the caller's back.
    ///
    /// Only the STALE/MISS path invokes the fetcher synchronously, and only
    /// that path propagates fetch errors.
    pub async fn fetch_with_swr<T, F>(&self, cache_key: &str, fetcher: &Arc<F>) -> QuillResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fetcher<T> + 'static,
    {
        if let Some(envelope) = self.read_envelope::<T>(cache_key).await? {
            match envelope.state(Utc::now()) {
                SwrState::Fresh => return Ok(envelope.data),
                SwrState::Revalidate => {
                    self.schedule_refresh(cache_key, fetcher).await;
                    return Ok(envelope.data);
                }
                // Too old to serve: same as a miss.
                SwrState::Stale => {}
            }
        }

        let value = fetcher.fetch().await.map_err(QuillError::Fetch)?;
        self.store_envelope(cache_key, &value).await;
        Ok(value)
    }

    /// Queue a deduplicated background refresh of `cache_key`.
    ///
    /// Whoever wins the refresh lock owns the refresh until it completes or
    /// the lock TTL reclaims it. Losing the lock (or the store, or the pool
    /// slot) makes this a no-op: the caller already holds servable data.
    async fn schedule_refresh<T, F>(&self, cache_key: &str, fetcher: &Arc<F>)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fetcher<T> + 'static,
    {
        let lock_key = refresh_lock_key(cache_key);
        match self.lock.acquire(&lock_key, self.config.refresh_lock_ttl).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "Could not reach store to schedule refresh");
                return;
            }
        }

        let engine = self.clone();
        let key = cache_key.to_string();
        let fetcher = Arc::clone(fetcher);
        let task = async move {
            match fetcher.fetch().await {
                Ok(value) => {
                    // Metadata is anchored at completion time, not at the
                    // instant the refresh was scheduled.
                    engine.store_envelope(&key, &value).await;
                    tracing::debug!(key = %key, "Background refresh completed");
                }
                Err(e) => {
                    engine.pool.record_failure();
                    tracing::warn!(key = %key, error = %e, "Background refresh failed; serving stale data");
                }
            }
            // Release runs after success and failure alike.
            if let Err(e) = engine.lock.release(&refresh_lock_key(&key)).await {
                tracing::warn!(key = %key, error = %e, "Failed to release refresh lock");
            }
        };

        if !self.pool.submit(task) {
            // The pool dropped the refresh; free the dedup lock now so the
            // next REVALIDATE read can try again instead of waiting out the
            // lock TTL.
            if let Err(e) = self.lock.release(&lock_key).await {
                tracing::warn!(key = cache_key, error = %e, "Failed to release refresh lock after drop");
            }
        }
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        cache_key: &str,
    ) -> QuillResult<Option<SwrEnvelope<T>>> {
        match self.store.read(cache_key).await? {
            // Malformed metadata classifies as a miss: synchronous refetch.
            Some(bytes) => Ok(decode_value(cache_key, &bytes)),
            None => Ok(None),
        }
    }

    /// Best-effort envelope write; the store entry expires once both
    /// windows have elapsed.
    async fn store_envelope<T: Serialize>(&self, cache_key: &str, value: &T) {
        let envelope = SwrEnvelope::build(value, Utc::now(), self.config.ttl, self.stale_grace);
        let store_ttl = self.config.ttl + self.stale_grace;
        match encode_value(cache_key, &envelope) {
            Ok(bytes) => {
                if let Err(e) = self.store.write(cache_key, bytes, Some(store_ttl)).await {
                    tracing::warn!(key = cache_key, error = %e, "Failed to store refreshed value");
                }
            }
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "Failed to serialize refreshed value");
            }
        }
    }
}
