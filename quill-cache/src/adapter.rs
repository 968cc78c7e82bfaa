//! The prompt cache adapter.
//!
//! One cache instance runs exactly one strategy, chosen at construction
//! from explicit configuration:
//!
//! - [`StrategyKind::InProcess`] - no shared store configured; a process-
//!   local bounded TTL cache fronts the fetcher.
//! - [`StrategyKind::Locked`] - shared store, no stale grace period;
//!   misses are stampede-protected by the population lock.
//! - [`StrategyKind::StaleWhileRevalidate`] - shared store plus a stale
//!   grace period; expired values are served while a bounded pool refreshes
//!   them in the background.
//!
//! The three strategies are an exhaustive enum, never probed for at
//! runtime. Requesting SWR without a grace period is not an error: it
//! degrades to the locked strategy.

use crate::config::CacheConfig;
use crate::fetcher::Fetcher;
use crate::refresh::{RefreshPool, RefreshSnapshot};
use crate::stampede::LockedFetch;
use crate::store::SharedStore;
use crate::swr::SwrFetch;
use crate::ttl::BoundedTtlCache;
use quill_core::{PromptDocument, PromptKey, QuillError, QuillResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Which strategy a cache instance is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    InProcess,
    Locked,
    StaleWhileRevalidate,
}

enum Strategy<T> {
    InProcess(BoundedTtlCache<T>),
    Locked(LockedFetch),
    Swr(SwrFetch),
}

/// Read-through cache for prompt documents (or any serializable payload).
pub struct PromptCache<T = PromptDocument> {
    strategy: Strategy<T>,
    pool: Option<Arc<RefreshPool>>,
    config: CacheConfig,
}

impl<T> std::fmt::Debug for PromptCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> PromptCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Cache without a shared store: the single-process fallback.
    pub fn in_process(config: CacheConfig) -> Self {
        let cache = BoundedTtlCache::new(config.ttl, config.max_entries);
        Self {
            strategy: Strategy::InProcess(cache),
            pool: None,
            config,
        }
    }

    /// Cache over a shared store. Runs stale-while-revalidate when the
    /// config carries a stale grace period, lock-based fetching otherwise.
    ///
    /// Must be constructed inside a Tokio runtime when SWR is enabled (the
    /// refresh pool spawns its workers eagerly).
    pub fn with_store(store: Arc<dyn SharedStore>, config: CacheConfig) -> Self {
        match config.stale_grace {
            Some(grace) => {
                let pool = Arc::new(RefreshPool::new(
                    config.refresh_workers,
                    config.refresh_queue,
                ));
                let engine = SwrFetch::new(store, Arc::clone(&pool), grace, config.clone());
                Self {
                    strategy: Strategy::Swr(engine),
                    pool: Some(pool),
                    config,
                }
            }
            None => Self {
                strategy: Strategy::Locked(LockedFetch::new(store, config.clone())),
                pool: None,
                config,
            },
        }
    }

    /// The strategy this instance was constructed with.
    pub fn strategy_kind(&self) -> StrategyKind {
        match &self.strategy {
            Strategy::InProcess(_) => StrategyKind::InProcess,
            Strategy::Locked(_) => StrategyKind::Locked,
            Strategy::Swr(_) => StrategyKind::StaleWhileRevalidate,
        }
    }

    /// The configuration this instance was constructed with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolve `key` through the cache, invoking `fetcher` as the strategy
    /// dictates on miss, stale, or background refresh.
    pub async fn get<F>(&self, key: &PromptKey, fetcher: &Arc<F>) -> QuillResult<T>
    where
        F: Fetcher<T> + 'static,
    {
        let cache_key = key.cache_key();
        match &self.strategy {
            Strategy::InProcess(cache) => {
                if let Some(value) = cache.get(&cache_key) {
                    return Ok(value);
                }
                let value = fetcher.fetch().await.map_err(QuillError::Fetch)?;
                Ok(cache.set(cache_key, value))
            }
            Strategy::Locked(engine) => engine.fetch_with_lock(&cache_key, fetcher.as_ref()).await,
            Strategy::Swr(engine) => engine.fetch_with_swr(&cache_key, fetcher).await,
        }
    }

    /// Refresh pool counters, if this instance runs a pool.
    pub fn refresh_metrics(&self) -> Option<RefreshSnapshot> {
        self.pool.as_ref().map(|pool| pool.metrics())
    }

    /// Tear down the background refresh pool, if any. Idempotent, and a
    /// no-op for strategies that never created one.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown(self.config.shutdown_grace).await;
        }
    }
}
