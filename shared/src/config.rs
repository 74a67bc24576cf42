use std::path::PathBuf;

use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    File,   // single JSON document
    Sled,   // embedded database
    Memory, // process-local, nothing survives a restart
}

impl StoreBackend {
    pub fn as_str(&self) -> &str {
        match self {
            StoreBackend::File => "file",
            StoreBackend::Sled => "sled",
            StoreBackend::Memory => "memory",
        }
    }
}

impl TryFrom<&str> for StoreBackend {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "sled" => Ok(StoreBackend::Sled),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
    pub max_cache_age_days: u64,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_MAX_CACHE_AGE_DAYS: u64 = 7;
    const FILE_STORE_NAME: &str = "feed-cache.json";
    const SLED_STORE_NAME: &str = "feed-cache.sled";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("FEED_CACHE_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string());

        let backend = match lookup("FEED_CACHE_BACKEND") {
            Some(raw) => StoreBackend::try_from(raw.as_str()).unwrap_or_else(|e| {
                warn!("{}, falling back to 'file'", e);
                StoreBackend::File
            }),
            None => StoreBackend::File,
        };

        let max_cache_age_days = match lookup("FEED_CACHE_MAX_AGE_DAYS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    warn!(
                        "FEED_CACHE_MAX_AGE_DAYS '{}' is not a positive number, using {}",
                        raw,
                        Self::DEFAULT_MAX_CACHE_AGE_DAYS
                    );
                    Self::DEFAULT_MAX_CACHE_AGE_DAYS
                }
            },
            None => Self::DEFAULT_MAX_CACHE_AGE_DAYS,
        };

        Self {
            data_dir: PathBuf::from(data_dir),
            backend,
            max_cache_age_days,
        }
    }

    /// Location of the store for the configured backend, `None` when it
    /// lives in memory only
    pub fn store_path(&self) -> Option<PathBuf> {
        match self.backend {
            StoreBackend::File => Some(self.data_dir.join(Self::FILE_STORE_NAME)),
            StoreBackend::Sled => Some(self.data_dir.join(Self::SLED_STORE_NAME)),
            StoreBackend::Memory => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
