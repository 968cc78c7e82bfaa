//! Cache configuration.
//!
//! All knobs live on [`CacheConfig`], which is passed explicitly to whatever
//! cache is constructed - there is no implicit global configuration. The
//! strategy a cache runs with is decided once, at construction, from this
//! struct (see `adapter`).

use std::time::Duration;

// ============================================================================
// DEFAULTS
// ============================================================================

const DEFAULT_TTL_SECS: u64 = 60;
const DEFAULT_MAX_ENTRIES: usize = 1_000;
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WAIT_BACKOFF_MS: [u64; 3] = [50, 100, 200];
const DEFAULT_REFRESH_LOCK_TTL_SECS: u64 = 60;
const DEFAULT_REFRESH_WORKERS: usize = 2;
const DEFAULT_REFRESH_QUEUE: usize = 16;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for a prompt cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached value stays fresh (default: 60 seconds).
    pub ttl: Duration,

    /// Maximum entry count for the in-process cache; one entry is evicted
    /// per insert once full (default: 1000).
    pub max_entries: usize,

    /// TTL of the population lock taken by the caller that fetches on a
    /// shared miss. Auto-expiry frees the key if the holder crashes
    /// (default: 10 seconds).
    pub lock_timeout: Duration,

    /// Sleep schedule for callers that lost the population race, re-reading
    /// the store after each step (default: 50ms, 100ms, 200ms).
    pub wait_backoff: Vec<Duration>,

    /// Grace period during which an expired value may still be served while
    /// a background refresh runs. `None` disables stale-while-revalidate and
    /// the cache falls back to lock-based fetching (default: None).
    pub stale_grace: Option<Duration>,

    /// TTL of the short-lived per-key lock that deduplicates background
    /// refreshes (default: 60 seconds).
    pub refresh_lock_ttl: Duration,

    /// Worker count of the background refresh pool (default: 2).
    pub refresh_workers: usize,

    /// Queue capacity of the background refresh pool; submissions beyond
    /// workers + queue are dropped (default: 16).
    pub refresh_queue: usize,

    /// How long `shutdown` waits for in-flight refreshes before abandoning
    /// them (default: 2 seconds).
    pub shutdown_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            wait_backoff: DEFAULT_WAIT_BACKOFF_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            stale_grace: None,
            refresh_lock_ttl: Duration::from_secs(DEFAULT_REFRESH_LOCK_TTL_SECS),
            refresh_workers: DEFAULT_REFRESH_WORKERS,
            refresh_queue: DEFAULT_REFRESH_QUEUE,
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the in-process entry bound.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the population lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the lost-race wait schedule.
    pub fn with_wait_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.wait_backoff = backoff;
        self
    }

    /// Enable stale-while-revalidate with the given grace period.
    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = Some(grace);
        self
    }

    /// Set the refresh-dedup lock TTL.
    pub fn with_refresh_lock_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_lock_ttl = ttl;
        self
    }

    /// Set the background refresh worker count.
    pub fn with_refresh_workers(mut self, workers: usize) -> Self {
        self.refresh_workers = workers;
        self
    }

    /// Set the background refresh queue capacity.
    pub fn with_refresh_queue(mut self, capacity: usize) -> Self {
        self.refresh_queue = capacity;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Create a CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `QUILL_CACHE_TTL_SECS`: Freshness TTL (default: 60)
    /// - `QUILL_CACHE_MAX_ENTRIES`: In-process entry bound (default: 1000)
    /// - `QUILL_CACHE_LOCK_TIMEOUT_SECS`: Population lock timeout (default: 10)
    /// - `QUILL_CACHE_STALE_GRACE_SECS`: Stale grace period; unset disables SWR
    /// - `QUILL_CACHE_REFRESH_WORKERS`: Refresh pool workers (default: 2)
    /// - `QUILL_CACHE_REFRESH_QUEUE`: Refresh pool queue capacity (default: 16)
    pub fn from_env() -> Self {
        let base = Self::default();

        let ttl = Duration::from_secs(
            std::env::var("QUILL_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TTL_SECS),
        );

        let max_entries = std::env::var("QUILL_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);

        let lock_timeout = Duration::from_secs(
            std::env::var("QUILL_CACHE_LOCK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS),
        );

        let stale_grace = std::env::var("QUILL_CACHE_STALE_GRACE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        let refresh_workers = std::env::var("QUILL_CACHE_REFRESH_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_WORKERS);

        let refresh_queue = std::env::var("QUILL_CACHE_REFRESH_QUEUE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_QUEUE);

        Self {
            ttl,
            max_entries,
            lock_timeout,
            stale_grace,
            refresh_workers,
            refresh_queue,
            ..base
        }
    }

    /// Create a configuration for development/testing with short windows.
    pub fn development() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            max_entries: 100,
            lock_timeout: Duration::from_secs(2),
            stale_grace: Some(Duration::from_secs(10)),
            refresh_lock_ttl: Duration::from_secs(5),
            refresh_workers: 1,
            refresh_queue: 4,
            shutdown_grace: Duration::from_millis(500),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(DEFAULT_TTL_SECS));
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(
            config.lock_timeout,
            Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS)
        );
        assert_eq!(
            config.wait_backoff,
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
        assert!(config.stale_grace.is_none());
        assert_eq!(config.refresh_workers, DEFAULT_REFRESH_WORKERS);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new()
            .with_ttl(Duration::from_secs(120))
            .with_max_entries(50)
            .with_lock_timeout(Duration::from_secs(5))
            .with_stale_grace(Duration::from_secs(300))
            .with_refresh_workers(4)
            .with_refresh_queue(32);

        assert_eq!(config.ttl, Duration::from_secs(120));
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.stale_grace, Some(Duration::from_secs(300)));
        assert_eq!(config.refresh_workers, 4);
        assert_eq!(config.refresh_queue, 32);
    }

    #[test]
    fn test_config_development() {
        let config = CacheConfig::development();
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert!(config.stale_grace.is_some());
        assert_eq!(config.refresh_workers, 1);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Without environment variables set, should match defaults
        let config = CacheConfig::from_env();
        assert_eq!(config.ttl, Duration::from_secs(DEFAULT_TTL_SECS));
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert!(config.stale_grace.is_none());
        assert_eq!(config.refresh_queue, DEFAULT_REFRESH_QUEUE);
    }
}
