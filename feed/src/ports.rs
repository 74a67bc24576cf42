use crate::domain::{CachedFeed, FeedImage, LocalFeedImage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use shared::Result;

// Ports are the pluggable extension points for storage and loading

/// Completion of a single store operation
pub type StoreFuture<T> = BoxFuture<'static, Result<T>>;

/// Decides from a retrieval outcome whether the stored snapshot should go
pub type RetrievalCheck = Box<dyn FnOnce(&Result<Option<CachedFeed>>) -> bool + Send + 'static>;

/// Port for the single-slot feed snapshot storage.
///
/// An operation is issued when the method is called, not when the returned
/// future is first polled. Side effects issued against one store instance take
/// effect in call order, and a retrieve observes every write issued before it.
/// The returned futures may resolve on any runtime thread; dropping one
/// discards the result but does not cancel the operation.
pub trait FeedStore: Send + Sync + 'static {
    /// Remove the stored snapshot. Succeeds when there is nothing to remove.
    fn delete_cached_feed(&self) -> StoreFuture<()>;

    /// Retrieve and, when `check` says so, delete, as one operation that no
    /// other operation on the same store can interleave with. Resolves to
    /// whether a delete happened; only a failed delete is an error.
    fn delete_cached_feed_if(&self, check: RetrievalCheck) -> StoreFuture<bool>;

    /// Replace whatever is stored with `feed` and `timestamp`, all or nothing.
    fn insert(&self, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> StoreFuture<()>;

    /// Read the stored snapshot, `None` when empty. Never mutates the store.
    fn retrieve(&self) -> StoreFuture<Option<CachedFeed>>;
}

/// Port for anything that can produce the current feed
#[async_trait]
pub trait FeedLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<FeedImage>>;
}
