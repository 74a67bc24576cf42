use crate::codec::{decode_image, decode_timestamp, encode_image, encode_timestamp};
use crate::queue::StoreQueue;
use chrono::{DateTime, Utc};
use feed::{CachedFeed, FeedStore, LocalFeedImage, RetrievalCheck, StoreFuture};
use shared::{Error, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;
use tracing::debug;

const IMAGES_TREE: &str = "feed_images";
const META_TREE: &str = "feed_meta";
const COUNT_KEY: &str = "count";
const TIMESTAMP_KEY: &str = "timestamp";

/// Feed store backed by a sled database.
///
/// Images live in their own tree keyed by big-endian position; the record
/// count and timestamp live in a metadata tree. Both trees are rewritten in a
/// single transaction, so the snapshot is replaced as a whole or not at all.
#[derive(Clone)]
pub struct SledFeedStore {
    db: Db,
    images: Tree,
    meta: Tree,
    queue: StoreQueue,
}

impl SledFeedStore {
    /// Open (or create) the database at `path`. Creates the parent directory
    /// if it doesn't exist. Must be called from within a Tokio runtime.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let queue = StoreQueue::for_location("sled-feed-store", path.as_ref())?;
        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;
        let images = db
            .open_tree(IMAGES_TREE)
            .map_err(|e| Error::Storage(format!("Failed to open images tree: {}", e)))?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|e| Error::Storage(format!("Failed to open meta tree: {}", e)))?;

        Ok(Self {
            db,
            images,
            meta,
            queue,
        })
    }
}

fn position_key(position: u64) -> Vec<u8> {
    position.to_be_bytes().to_vec()
}

fn parse_count(value: Option<IVec>) -> std::result::Result<u64, String> {
    match value {
        None => Ok(0),
        Some(bytes) => <[u8; 8]>::try_from(bytes.as_ref())
            .map(u64::from_be_bytes)
            .map_err(|_| format!("record count has {} bytes, expected 8", bytes.len())),
    }
}

/// Swap the stored snapshot for `next`, or clear it when `next` is `None`.
fn replace_snapshot(
    db: &Db,
    images: &Tree,
    meta: &Tree,
    next: Option<(Vec<Vec<u8>>, Vec<u8>)>,
) -> Result<()> {
    (images, meta)
        .transaction(|(images, meta)| {
            let previous =
                parse_count(meta.get(COUNT_KEY)?).map_err(ConflictableTransactionError::Abort)?;
            for position in 0..previous {
                images.remove(position_key(position))?;
            }

            match &next {
                Some((encoded_images, timestamp)) => {
                    for (position, image) in encoded_images.iter().enumerate() {
                        images.insert(position_key(position as u64), image.as_slice())?;
                    }
                    let count = (encoded_images.len() as u64).to_be_bytes();
                    meta.insert(COUNT_KEY, &count[..])?;
                    meta.insert(TIMESTAMP_KEY, timestamp.as_slice())?;
                }
                None => {
                    meta.remove(COUNT_KEY)?;
                    meta.remove(TIMESTAMP_KEY)?;
                }
            }
            Ok(())
        })
        .map_err(|e: TransactionError<String>| {
            Error::Storage(format!("Feed cache transaction failed: {:?}", e))
        })?;

    db.flush()
        .map_err(|e| Error::Storage(format!("Failed to flush database: {}", e)))?;

    Ok(())
}

fn read_snapshot(images: &Tree, meta: &Tree) -> Result<Option<CachedFeed>> {
    let timestamp = meta
        .get(TIMESTAMP_KEY)
        .map_err(|e| Error::Storage(format!("Failed to get timestamp: {}", e)))?;
    let Some(timestamp) = timestamp else {
        return Ok(None);
    };
    let timestamp = decode_timestamp(&timestamp)?;

    let count = meta
        .get(COUNT_KEY)
        .map_err(|e| Error::Storage(format!("Failed to get record count: {}", e)))?;
    let count = parse_count(count).map_err(Error::Decode)?;

    let mut feed = Vec::new();
    for position in 0..count {
        let bytes = images
            .get(position_key(position))
            .map_err(|e| Error::Storage(format!("Failed to get feed image: {}", e)))?
            .ok_or_else(|| Error::Decode(format!("Missing feed image at position {}", position)))?;
        feed.push(decode_image(&bytes)?);
    }

    Ok(Some(CachedFeed::new(feed, timestamp)))
}

impl FeedStore for SledFeedStore {
    fn delete_cached_feed(&self) -> StoreFuture<()> {
        let (db, images, meta) = (self.db.clone(), self.images.clone(), self.meta.clone());
        self.queue.write(move || {
            replace_snapshot(&db, &images, &meta, None)?;
            debug!("Deleted feed cache from sled");
            Ok(())
        })
    }

    fn delete_cached_feed_if(&self, check: RetrievalCheck) -> StoreFuture<bool> {
        let (db, images, meta) = (self.db.clone(), self.images.clone(), self.meta.clone());
        self.queue.write(move || {
            if !check(&read_snapshot(&images, &meta)) {
                return Ok(false);
            }
            replace_snapshot(&db, &images, &meta, None)?;
            debug!("Deleted feed cache from sled");
            Ok(true)
        })
    }

    fn insert(&self, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> StoreFuture<()> {
        let (db, images, meta) = (self.db.clone(), self.images.clone(), self.meta.clone());
        self.queue.write(move || {
            let encoded = feed.iter().map(encode_image).collect::<Result<Vec<_>>>()?;
            let count = encoded.len();
            replace_snapshot(&db, &images, &meta, Some((encoded, encode_timestamp(&timestamp)?)))?;
            debug!("Stored {} feed image(s) in sled", count);
            Ok(())
        })
    }

    fn retrieve(&self) -> StoreFuture<Option<CachedFeed>> {
        let (images, meta) = (self.images.clone(), self.meta.clone());
        self.queue.read(move || read_snapshot(&images, &meta))
    }
}

impl std::fmt::Debug for SledFeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledFeedStore")
            .field("db", &"<sled::Db>")
            .finish()
    }
}
