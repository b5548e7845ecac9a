use std::path::PathBuf;
use std::time::Duration;

/// File name of the durable cache database inside the cache directory.
pub const STORE_FILE: &str = "coin-cache.duckdb";

/// How long a freshness marker stays valid after an entry is written.
pub const DEFAULT_VALIDITY_TTL: Duration = Duration::from_secs(5 * 60);

/// Window after which a client-side cache reset is forced.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Upper bound on coins whose full details are kept preloaded.
pub const DEFAULT_MAX_PRELOADED_COINS: usize = 10;

/// Key of the single row in the `globalCacheInfo` table.
pub const GLOBAL_CACHE_INFO_KEY: &str = "cacheInfo";

pub fn default_cache_dir() -> PathBuf {
    if let Some(cache) = dirs::cache_dir() {
        cache.join("coin-cache")
    } else {
        PathBuf::from(".coin-cache")
    }
}

pub fn default_store_path() -> PathBuf {
    default_cache_dir().join(STORE_FILE)
}
