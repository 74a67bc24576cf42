//! Serialized forms shared by the on-disk stores.

use chrono::{DateTime, Utc};
use feed::{CachedFeed, LocalFeedImage};
use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use url::Url;
use uuid::Uuid;

/// One feed image as written to disk. Absent optionals encode as `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFeedImage {
    pub id: Uuid,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Url,
}

impl From<&LocalFeedImage> for StoredFeedImage {
    fn from(image: &LocalFeedImage) -> Self {
        Self {
            id: image.id,
            description: image.description.clone(),
            location: image.location.clone(),
            url: image.url.clone(),
        }
    }
}

impl From<StoredFeedImage> for LocalFeedImage {
    fn from(stored: StoredFeedImage) -> Self {
        LocalFeedImage::new(stored.id, stored.description, stored.location, stored.url)
    }
}

/// Whole-snapshot document used by the file store
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCache {
    pub feed: Vec<StoredFeedImage>,
    pub timestamp: DateTime<Utc>,
}

pub fn encode_cache(feed: &[LocalFeedImage], timestamp: DateTime<Utc>) -> Result<Vec<u8>> {
    let document = StoredCache {
        feed: feed.iter().map(StoredFeedImage::from).collect(),
        timestamp,
    };
    serde_json::to_vec(&document)
        .map_err(|e| Error::Storage(format!("Failed to encode feed cache: {}", e)))
}

pub fn decode_cache(bytes: &[u8]) -> Result<CachedFeed> {
    let document: StoredCache = serde_json::from_slice(bytes)
        .map_err(|e| Error::Decode(format!("Failed to decode feed cache: {}", e)))?;

    Ok(CachedFeed::new(
        document.feed.into_iter().map(LocalFeedImage::from).collect(),
        document.timestamp,
    ))
}

pub fn encode_image(image: &LocalFeedImage) -> Result<Vec<u8>> {
    serde_json::to_vec(&StoredFeedImage::from(image))
        .map_err(|e| Error::Storage(format!("Failed to encode feed image: {}", e)))
}

pub fn decode_image(bytes: &[u8]) -> Result<LocalFeedImage> {
    serde_json::from_slice::<StoredFeedImage>(bytes)
        .map(LocalFeedImage::from)
        .map_err(|e| Error::Decode(format!("Failed to decode feed image: {}", e)))
}

pub fn encode_timestamp(timestamp: &DateTime<Utc>) -> Result<Vec<u8>> {
    serde_json::to_vec(timestamp)
        .map_err(|e| Error::Storage(format!("Failed to encode timestamp: {}", e)))
}

pub fn decode_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Decode(format!("Failed to decode timestamp: {}", e)))
}
