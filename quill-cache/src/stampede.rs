//! Stampede-protected read-through fetch.
//!
//! On a shared-store miss, concurrent callers race for a population lock.
//! The winner fetches, stores, and releases; losers poll the store on a
//! bounded backoff schedule and are served the populated value without ever
//! touching the remote source. If the winner disappears before populating,
//! waiters fall back to fetching directly - a bounded duplicate fetch is
//! accepted in that degraded case.

use crate::config::CacheConfig;
use crate::fetcher::Fetcher;
use crate::lock::{population_lock_key, DistributedLock};
use crate::store::{decode_value, encode_value, SharedStore};
use quill_core::{QuillError, QuillResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Lock-based read-through over the shared store.
pub struct LockedFetch {
    store: Arc<dyn SharedStore>,
    lock: DistributedLock,
    config: CacheConfig,
}

impl LockedFetch {
    pub fn new(store: Arc<dyn SharedStore>, config: CacheConfig) -> Self {
        let lock = DistributedLock::new(Arc::clone(&store));
        Self {
            store,
            lock,
            config,
        }
    }

    /// Fetch `cache_key` through the store, coordinating concurrent callers
    /// so that a cold key is fetched once under normal conditions.
    ///
    /// Fetch errors on this path propagate to the caller unchanged; the
    /// population lock is released on success and failure alike.
    pub async fn fetch_with_lock<T, F>(&self, cache_key: &str, fetcher: &F) -> QuillResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Fetcher<T> + ?Sized,
    {
        // Fast path: no lock traffic on a hit.
        if let Some(value) = self.read_cached(cache_key).await? {
            return Ok(value);
        }

        let lock_key = population_lock_key(cache_key);
        if self.lock.acquire(&lock_key, self.config.lock_timeout).await? {
            // Won the race: fetch, store, then release - in that order, on
            // every exit path. Cancellation is covered by the lock TTL.
            let result = self.populate(cache_key, fetcher).await;
            if let Err(e) = self.lock.release(&lock_key).await {
                tracing::warn!(key = cache_key, error = %e, "Failed to release population lock");
            }
            return result;
        }

        // Lost the race: poll for the winner's value.
        for delay in &self.config.wait_backoff {
            tokio::time::sleep(*delay).await;
            if let Some(value) = self.read_cached(cache_key).await? {
                return Ok(value);
            }
        }

        // The lock holder never populated. Fetch directly without a lock;
        // the duplicate fetch is bounded and last-writer-wins applies.
        tracing::warn!(
            key = cache_key,
            "Populated value did not appear within the wait budget; fetching without lock"
        );
        let value = fetcher.fetch().await.map_err(QuillError::Fetch)?;
        self.store_value(cache_key, &value).await;
        Ok(value)
    }

    async fn populate<T, F>(&self, cache_key: &str, fetcher: &F) -> QuillResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Fetcher<T> + ?Sized,
    {
        let value = fetcher.fetch().await.map_err(QuillError::Fetch)?;
        self.store_value(cache_key, &value).await;
        Ok(value)
    }

    async fn read_cached<T: DeserializeOwned>(&self, cache_key: &str) -> QuillResult<Option<T>> {
        match self.store.read(cache_key).await? {
            // Malformed bytes classify as a miss and fall through to a fetch.
            Some(bytes) => Ok(decode_value(cache_key, &bytes)),
            None => Ok(None),
        }
    }

    /// Best-effort store write: a fetched value is returned to the caller
    /// even when persisting it fails.
    async fn store_value<T: Serialize>(&self, cache_key: &str, value: &T) {
        match encode_value(cache_key, value) {
            Ok(bytes) => {
                if let Err(e) = self.store.write(cache_key, bytes, Some(self.config.ttl)).await {
                    tracing::warn!(key = cache_key, error = %e, "Failed to store fetched value");
                }
            }
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "Failed to serialize fetched value");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use quill_core::{FetchError, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
        value: String,
    }

    impl CountingFetcher {
        fn new(value: &str, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                value: value.to_string(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher<String> for CountingFetcher {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.value.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher<String> for FailingFetcher {
        async fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    /// Store behaving like an unreachable backend: every operation fails.
    /// With `reads_succeed` the read path misses cleanly instead, so the
    /// outage first surfaces at the lock acquire.
    struct OutageStore {
        reads_succeed: bool,
    }

    fn store_offline() -> StoreError {
        StoreError::Unavailable {
            reason: "store offline".to_string(),
        }
    }

    #[async_trait]
    impl SharedStore for OutageStore {
        async fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            if self.reads_succeed {
                Ok(None)
            } else {
                Err(store_offline())
            }
        }

        async fn write(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            Err(store_offline())
        }

        async fn write_if_absent(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<bool, StoreError> {
            Err(store_offline())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(store_offline())
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, StoreError> {
            Err(store_offline())
        }
    }

    fn engine() -> (LockedFetch, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = LockedFetch::new(store.clone(), CacheConfig::default());
        (engine, store)
    }

    #[tokio::test]
    async fn test_hit_skips_fetcher_and_lock() {
        let (engine, store) = engine();
        store
            .write("greeting", encode_value("greeting", &"cached".to_string()).unwrap(), None)
            .await
            .unwrap();
        let fetcher = CountingFetcher::new("fresh", Duration::ZERO);

        let value = engine.fetch_with_lock("greeting", &fetcher).await.unwrap();

        assert_eq!(value, "cached");
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(store.read("lock:greeting").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_miss_populates_store_and_releases_lock() {
        let (engine, store) = engine();
        let fetcher = CountingFetcher::new("fresh", Duration::ZERO);

        let value = engine.fetch_with_lock("greeting", &fetcher).await.unwrap();

        assert_eq!(value, "fresh");
        assert_eq!(fetcher.calls(), 1);
        let cached: Option<String> = decode_value(
            "greeting",
            &store.read("greeting").await.unwrap().expect("populated"),
        );
        assert_eq!(cached, Some("fresh".to_string()));
        assert_eq!(store.read("lock:greeting").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_fetch_once() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(LockedFetch::new(
            store.clone() as Arc<dyn SharedStore>,
            CacheConfig::default(),
        ));
        let fetcher = Arc::new(CountingFetcher::new("fresh", Duration::from_millis(50)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            let fetcher = Arc::clone(&fetcher);
            handles.push(tokio::spawn(async move {
                engine
                    .fetch_with_lock::<String, _>("greeting", fetcher.as_ref())
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "fresh");
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_wait_exhaustion_falls_back_to_direct_fetch() {
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig::default().with_wait_backoff(vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40),
        ]);
        let engine = LockedFetch::new(store.clone() as Arc<dyn SharedStore>, config);

        // Simulate a crashed holder: the lock exists but nobody populates.
        store
            .write_if_absent("lock:greeting", b"1".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        let fetcher = CountingFetcher::new("fallback", Duration::ZERO);
        let started = Instant::now();
        let value = engine.fetch_with_lock("greeting", &fetcher).await.unwrap();

        assert_eq!(value, "fallback");
        assert_eq!(fetcher.calls(), 1);
        // The full wait schedule ran before the degraded fetch.
        assert!(started.elapsed() >= Duration::from_millis(70));
        // The fallback result was still written through.
        assert!(store.read("greeting").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_released_after_fetch_failure() {
        let (engine, store) = engine();

        let result = engine
            .fetch_with_lock::<String, _>("greeting", &FailingFetcher)
            .await;

        assert!(matches!(result, Err(QuillError::Fetch(FetchError::Api { .. }))));
        // Release ran on the failure path: the lock key is gone.
        assert_eq!(store.read("lock:greeting").await.unwrap(), None);
        // And the value was never populated.
        assert_eq!(store.read("greeting").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_outage_on_read_propagates() {
        let engine = LockedFetch::new(
            Arc::new(OutageStore {
                reads_succeed: false,
            }),
            CacheConfig::default(),
        );
        let fetcher = CountingFetcher::new("fresh", Duration::ZERO);

        let result = engine.fetch_with_lock::<String, _>("greeting", &fetcher).await;

        assert!(matches!(
            result,
            Err(QuillError::Store(StoreError::Unavailable { .. }))
        ));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_acquire_is_an_error_not_an_unlocked_fetch() {
        // Reads miss cleanly but the lock cannot be taken. The outage must
        // surface to the caller; it is never treated as "lock acquired".
        let engine = LockedFetch::new(
            Arc::new(OutageStore {
                reads_succeed: true,
            }),
            CacheConfig::default(),
        );
        let fetcher = CountingFetcher::new("fresh", Duration::ZERO);

        let result = engine.fetch_with_lock::<String, _>("greeting", &fetcher).await;

        assert!(matches!(
            result,
            Err(QuillError::Store(StoreError::Unavailable { .. }))
        ));
        // No unlocked fetch happened behind the failure.
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_record_treated_as_miss() {
        let (engine, store) = engine();
        store
            .write("greeting", b"not json".to_vec(), None)
            .await
            .unwrap();
        let fetcher = CountingFetcher::new("fresh", Duration::ZERO);

        let value = engine.fetch_with_lock("greeting", &fetcher).await.unwrap();

        assert_eq!(value, "fresh");
        assert_eq!(fetcher.calls(), 1);
    }
}
