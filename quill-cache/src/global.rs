//! Optional process-wide cache handle.
//!
//! A convenience for applications that want one shared [`PromptCache`]
//! without threading it through every call site. The lifecycle is explicit:
//! [`init`] installs a cache, [`get`] hands out the current one, [`reset`]
//! removes it (returning it so the caller can shut its pool down). Nothing
//! is constructed lazily behind the caller's back.

use crate::adapter::PromptCache;
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

static GLOBAL: Lazy<RwLock<Option<Arc<PromptCache>>>> = Lazy::new(|| RwLock::new(None));

/// Errors from the global cache lifecycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GlobalCacheError {
    #[error("Global prompt cache already initialized; reset it first")]
    AlreadyInitialized,
}

/// Install the process-wide cache. Fails if one is already installed.
pub fn init(cache: PromptCache) -> Result<Arc<PromptCache>, GlobalCacheError> {
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(GlobalCacheError::AlreadyInitialized);
    }
    let cache = Arc::new(cache);
    *slot = Some(Arc::clone(&cache));
    Ok(cache)
}

/// The currently installed cache, if any.
pub fn get() -> Option<Arc<PromptCache>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Remove the installed cache and return it, so the caller can await its
/// shutdown. Safe to call when nothing is installed.
pub fn reset() -> Option<Arc<PromptCache>> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}
