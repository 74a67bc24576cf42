use chrono::Utc;
use feed::{FeedCachePolicy, LocalFeedLoader};
use shared::config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting feed cache maintenance");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    // ============================================
    // STEP 1: Open the configured store
    // ============================================
    let store = match storage_engine::open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            let location = config
                .store_path()
                .map_or_else(|| "memory".to_string(), |path| path.display().to_string());
            error!(
                "Failed to open {} store at {}: {}",
                config.backend.as_str(),
                location,
                e
            );
            return Err(e.into());
        }
    };

    let loader = LocalFeedLoader::new(store, Utc::now)
        .with_policy(FeedCachePolicy::new(config.max_cache_age_days));

    // ============================================
    // STEP 2: Purge an unreadable or stale cache
    // ============================================
    info!(
        "Validating feed cache (max age {} day(s))",
        config.max_cache_age_days
    );
    loader.validate_cache().await;

    // ============================================
    // STEP 3: Report what is available offline
    // ============================================
    match loader.load().await {
        Ok(feed) if feed.is_empty() => warn!("No cached feed available"),
        Ok(feed) => {
            info!("{} cached feed image(s) available", feed.len());
            for image in &feed {
                info!(
                    "  - {} {} ({})",
                    image.id,
                    image.url,
                    image.location.as_deref().unwrap_or("no location")
                );
            }
        }
        Err(e) => {
            error!("Failed to load cached feed: {}", e);
            return Err(e.into());
        }
    }

    info!("Feed cache maintenance finished");
    Ok(())
}
