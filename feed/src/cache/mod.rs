mod local_feed_loader;
pub mod policy;


pub use local_feed_loader::LocalFeedLoader;
pub use policy::FeedCachePolicy;
