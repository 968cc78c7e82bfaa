//! The remote-fetch seam.
//!
//! A [`Fetcher`] wraps one expensive lookup against the source of truth,
//! already bound to its key by the caller. The cache invokes it on a genuine
//! miss, on a stale read, or from a background refresh. Implementations are
//! user-supplied; this crate ships none.

use async_trait::async_trait;
use quill_core::FetchError;

/// A zero-argument fetch of one value from the source of truth.
///
/// Implementations must be thread-safe (Send + Sync); background refreshes
/// may invoke them from worker tasks long after the triggering request
/// returned.
///
/// # Example
/// ```ignore
/// struct ApiPromptFetch { client: ApiClient, key: PromptKey }
///
/// #[async_trait]
/// impl Fetcher<PromptDocument> for ApiPromptFetch {
///     async fn fetch(&self) -> Result<PromptDocument, FetchError> {
///         self.client.get_prompt(&self.key).await
///     }
/// }
/// ```
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    /// Fetch the value. Errors propagate unchanged to the synchronous
    /// caller; on the background path they are contained and logged.
    async fn fetch(&self) -> Result<T, FetchError>;
}
