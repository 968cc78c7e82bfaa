//! Error types for QUILL operations

use thiserror::Error;

/// Shared-store layer errors.
///
/// The backing store is the synchronization point across processes, so its
/// failures are never swallowed: callers decide whether to degrade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Remote prompt API errors, as surfaced by a fetcher implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Prompt not found: {name}")]
    NotFound { name: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Request failed with status {status}: {message}")]
    Api { status: i32, message: String },

    #[error("Network error: {reason}")]
    Network { reason: String },
}

/// Master error type for all QUILL errors.
#[derive(Debug, Clone, Error)]
pub enum QuillError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Result type alias for QUILL operations.
pub type QuillResult<T> = Result<T, QuillError>;

// =============================================================================
// TESTS
// =============================================================================
