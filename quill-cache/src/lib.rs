//! QUILL Cache - Read-Through Prompt Caching
//!
//! A read-through caching engine for prompt documents with three
//! strategies behind one adapter:
//!
//! - an in-process bounded TTL cache for single-process deployments,
//! - stampede-protected fetching over a shared store, where concurrent
//!   misses are serialized by a distributed lock,
//! - stale-while-revalidate, where expired values are served immediately
//!   and refreshed by a bounded background worker pool.
//!
//! The shared store and the remote fetch are trait seams ([`SharedStore`],
//! [`Fetcher`]); implementations against a real network store or the remote
//! prompt API are user-supplied. [`MemoryStore`] ships as the reference
//! store implementation.

pub mod adapter;
pub mod config;
pub mod fetcher;
pub mod global;
pub mod lock;
pub mod refresh;
pub mod stampede;
pub mod store;
pub mod swr;
pub mod ttl;

pub use adapter::{PromptCache, StrategyKind};
pub use config::CacheConfig;
pub use fetcher::Fetcher;
pub use global::GlobalCacheError;
pub use lock::DistributedLock;
pub use refresh::{RefreshPool, RefreshSnapshot};
pub use stampede::LockedFetch;
pub use store::{MemoryStore, SharedStore};
pub use swr::{SwrEnvelope, SwrFetch, SwrState};
pub use ttl::BoundedTtlCache;

// Re-export the core types callers need alongside the cache.
pub use quill_core::{
    FetchError, PromptDocument, PromptKey, PromptSelector, QuillError, QuillResult, StoreError,
};
