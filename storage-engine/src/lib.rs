pub mod codec;
pub mod file_store;
pub mod memory_store;
pub mod queue;
pub mod sled_store;

#[cfg(test)]
mod store_contract;

use feed::FeedStore;
use shared::Result;
use shared::config::{Config, StoreBackend};
use std::sync::Arc;
use tracing::info;

pub use file_store::FileFeedStore;
pub use memory_store::InMemoryFeedStore;
pub use queue::StoreQueue;
pub use sled_store::SledFeedStore;

/// Open the backend selected by `config`. File and sled backends must be
/// opened from within a Tokio runtime.
pub fn open_store(config: &Config) -> Result<Arc<dyn FeedStore>> {
    let path = config.store_path();
    let store: Arc<dyn FeedStore> = match (config.backend, &path) {
        (StoreBackend::File, Some(path)) => Arc::new(FileFeedStore::new(path)?),
        (StoreBackend::Sled, Some(path)) => Arc::new(SledFeedStore::new(path)?),
        _ => Arc::new(InMemoryFeedStore::new()),
    };

    match path {
        Some(path) => info!(
            "Opened {} feed store at {}",
            config.backend.as_str(),
            path.display()
        ),
        None => info!("Opened in-memory feed store"),
    }
    Ok(store)
}
