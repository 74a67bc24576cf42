use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

/// A feed entry as the rest of the application sees it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedImage {
    pub id: Uuid,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Url,
}

impl FeedImage {
    pub fn new(
        id: Uuid,
        description: Option<String>,
        location: Option<String>,
        url: Url,
    ) -> Self {
        Self {
            id,
            description,
            location,
            url,
        }
    }
}

/// A feed entry in the form handed to a [`crate::ports::FeedStore`].
///
/// Kept separate from [`FeedImage`] so storage backends never depend on the
/// domain model; `LocalFeedLoader` maps between the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFeedImage {
    pub id: Uuid,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Url,
}

impl LocalFeedImage {
    pub fn new(
        id: Uuid,
        description: Option<String>,
        location: Option<String>,
        url: Url,
    ) -> Self {
        Self {
            id,
            description,
            location,
            url,
        }
    }
}

impl From<&FeedImage> for LocalFeedImage {
    fn from(image: &FeedImage) -> Self {
        Self {
            id: image.id,
            description: image.description.clone(),
            location: image.location.clone(),
            url: image.url.clone(),
        }
    }
}

impl From<LocalFeedImage> for FeedImage {
    fn from(local: LocalFeedImage) -> Self {
        Self {
            id: local.id,
            description: local.description,
            location: local.location,
            url: local.url,
        }
    }
}

/// The single snapshot a store holds: the ordered feed and when it was cached
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFeed {
    pub feed: Vec<LocalFeedImage>,
    pub timestamp: DateTime<Utc>,
}

impl CachedFeed {
    pub fn new(feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> Self {
        Self { feed, timestamp }
    }
}
