use chrono::{DateTime, Utc};
use feed::{CachedFeed, FeedStore, LocalFeedImage, RetrievalCheck, StoreFuture};
use futures::FutureExt;
use futures::future::ready;
use shared::{Error, Result};
use std::sync::Mutex;

/// Process-local feed store. Every operation takes effect before the call
/// returns, which trivially keeps issuance order.
#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    slot: Mutex<Option<CachedFeed>>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<CachedFeed>) -> T) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| Error::Internal(format!("Lock poisoned: {}", e)))?;
        Ok(f(&mut slot))
    }
}

impl FeedStore for InMemoryFeedStore {
    fn delete_cached_feed(&self) -> StoreFuture<()> {
        ready(self.with_slot(|slot| {
            slot.take();
        }))
        .boxed()
    }

    fn delete_cached_feed_if(&self, check: RetrievalCheck) -> StoreFuture<bool> {
        ready(self.with_slot(|slot| {
            let deleted = check(&Ok(slot.clone()));
            if deleted {
                slot.take();
            }
            deleted
        }))
        .boxed()
    }

    fn insert(&self, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> StoreFuture<()> {
        ready(self.with_slot(|slot| {
            *slot = Some(CachedFeed::new(feed, timestamp));
        }))
        .boxed()
    }

    fn retrieve(&self) -> StoreFuture<Option<CachedFeed>> {
        ready(self.with_slot(|slot| slot.clone())).boxed()
    }
}
