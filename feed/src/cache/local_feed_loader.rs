use crate::cache::policy::FeedCachePolicy;
use crate::domain::{CachedFeed, FeedImage, LocalFeedImage};
use crate::ports::{FeedLoader, FeedStore, RetrievalCheck};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

type CurrentDate = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Application service that sequences store calls and the staleness policy
/// into the load, save and validate use cases.
///
/// Owns no storage. Every use case is a future borrowing the loader, so a
/// result can never be delivered after the loader is gone; dropping the future
/// drops the result with it.
#[derive(Clone)]
pub struct LocalFeedLoader {
    store: Arc<dyn FeedStore>,
    current_date: CurrentDate,
    policy: FeedCachePolicy,
}

impl LocalFeedLoader {
    pub fn new<F>(store: Arc<dyn FeedStore>, current_date: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            store,
            current_date: Arc::new(current_date),
            policy: FeedCachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FeedCachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FeedCachePolicy {
        self.policy
    }

    /// Replace the cached feed: delete first, insert only if that succeeded.
    pub async fn save(&self, feed: &[FeedImage]) -> Result<()> {
        self.store.delete_cached_feed().await?;

        let local: Vec<LocalFeedImage> = feed.iter().map(LocalFeedImage::from).collect();
        let count = local.len();
        let timestamp = (self.current_date)();

        self.store.insert(local, timestamp).await?;
        info!("Cached {} feed image(s) at {}", count, timestamp);
        Ok(())
    }

    /// Return the cached feed when it is still fresh, otherwise an empty feed.
    ///
    /// Retrieval errors are passed through untouched. Loading never deletes,
    /// even when the snapshot is stale or unreadable.
    pub async fn load(&self) -> Result<Vec<FeedImage>> {
        let Some(cached) = self.store.retrieve().await? else {
            debug!("Feed cache is empty");
            return Ok(Vec::new());
        };

        let now = (self.current_date)();
        if !self.policy.validate(cached.timestamp, now) {
            debug!("Cached feed from {} is stale at {}", cached.timestamp, now);
            return Ok(Vec::new());
        }

        Ok(cached.feed.into_iter().map(FeedImage::from).collect())
    }

    /// Purge the cache when it is unreadable or stale.
    ///
    /// The staleness decision and the delete run as one store operation, so a
    /// save that lands in between is never wiped.
    pub async fn validate_cache(&self) {
        let policy = self.policy;
        let current_date = self.current_date.clone();
        let check: RetrievalCheck = Box::new(move |retrieved: &Result<Option<CachedFeed>>| {
            match retrieved {
                Err(e) => {
                    info!("Deleting feed cache, retrieval failed: {}", e);
                    true
                }
                Ok(Some(cached)) if !policy.validate(cached.timestamp, current_date()) => {
                    info!("Deleting feed cache, snapshot from {} is stale", cached.timestamp);
                    true
                }
                Ok(_) => false,
            }
        });

        if let Err(e) = self.store.delete_cached_feed_if(check).await {
            warn!("Failed to delete invalid feed cache: {}", e);
        }
    }
}

#[async_trait]
impl FeedLoader for LocalFeedLoader {
    async fn load(&self) -> Result<Vec<FeedImage>> {
        LocalFeedLoader::load(self).await
    }
}

impl std::fmt::Debug for LocalFeedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFeedLoader")
            .field("store", &"<dyn FeedStore>")
            .field("policy", &self.policy)
            .finish()
    }
}
