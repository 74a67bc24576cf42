use crate::codec::{decode_cache, encode_cache};
use crate::queue::StoreQueue;
use chrono::{DateTime, Utc};
use feed::{CachedFeed, FeedStore, LocalFeedImage, RetrievalCheck, StoreFuture};
use shared::{Error, Result};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Feed store backed by a single JSON document on disk.
///
/// Writes go to a temporary file next to the target which is then renamed over
/// it, so a reader sees either the previous snapshot or the new one. Every
/// `FileFeedStore` opened on the same file in this process shares one queue.
#[derive(Clone)]
pub struct FileFeedStore {
    path: Arc<PathBuf>,
    queue: StoreQueue,
}

impl FileFeedStore {
    /// Must be called from within a Tokio runtime.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let queue = StoreQueue::for_location("file-feed-store", &path)?;
        Ok(Self {
            path: Arc::new(path),
            queue,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_cache(path: &Path) -> Result<Option<CachedFeed>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    decode_cache(&bytes).map(Some)
}

fn remove_cache(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Storage(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

fn write_cache(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent).map_err(|e| {
        Error::Storage(format!(
            "Failed to create directory {}: {}",
            parent.display(),
            e
        ))
    })?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| Error::Storage(format!("Failed to stage feed cache: {}", e)))?;
    staged
        .write_all(bytes)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| Error::Storage(format!("Failed to write feed cache: {}", e)))?;

    // the staged file is removed on drop if the rename fails
    staged.persist(path).map_err(|e| {
        Error::Storage(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

impl FeedStore for FileFeedStore {
    fn delete_cached_feed(&self) -> StoreFuture<()> {
        let path = self.path.clone();
        self.queue.write(move || {
            remove_cache(&path)?;
            debug!("Deleted feed cache at {}", path.display());
            Ok(())
        })
    }

    fn delete_cached_feed_if(&self, check: RetrievalCheck) -> StoreFuture<bool> {
        let path = self.path.clone();
        self.queue.write(move || {
            if !check(&read_cache(&path)) {
                return Ok(false);
            }
            remove_cache(&path)?;
            debug!("Deleted feed cache at {}", path.display());
            Ok(true)
        })
    }

    fn insert(&self, feed: Vec<LocalFeedImage>, timestamp: DateTime<Utc>) -> StoreFuture<()> {
        let path = self.path.clone();
        self.queue.write(move || {
            let bytes = encode_cache(&feed, timestamp)?;
            write_cache(&path, &bytes)?;
            debug!(
                "Stored {} feed image(s) at {} ({} bytes)",
                feed.len(),
                path.display(),
                bytes.len()
            );
            Ok(())
        })
    }

    fn retrieve(&self) -> StoreFuture<Option<CachedFeed>> {
        let path = self.path.clone();
        self.queue.read(move || read_cache(&path))
    }
}

impl std::fmt::Debug for FileFeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFeedStore")
            .field("path", &self.path)
            .finish()
    }
}
