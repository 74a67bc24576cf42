#![deny(clippy::all)]

pub mod cache;
pub mod domain;
pub mod ports;

pub use cache::{FeedCachePolicy, LocalFeedLoader};
pub use domain::{CachedFeed, FeedImage, LocalFeedImage};
pub use ports::{FeedLoader, FeedStore, RetrievalCheck, StoreFuture};
