// Cache Domain Constants

use serde::{Deserialize, Serialize};

/// Default expiry for cached values (2 hours)
pub const DEFAULT_EXPIRY_SECONDS: u64 = 7200;

/// Default chunk size for `get_values_in_batches`
pub const DEFAULT_MGET_BATCH_SIZE: usize = 100;

/// Default key prefix for memoized function results
pub const DEFAULT_CACHE_FN_PREFIX: &str = "cacheFn:";

/// Minimum length, in UTF-16 code units, of a pattern accepted by
/// `remove_keys_by_pattern`
pub const MIN_DELETE_PATTERN_LEN: usize = 5;

/// Options for `CacheService::cache_fn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFnOptions {
    pub key_prefix: String,
    /// Read and write through the global namespace instead of the service one
    pub is_global: bool,
}

impl Default for CacheFnOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_CACHE_FN_PREFIX.to_string(),
            is_global: false,
        }
    }
}

/// Resolve a caller TTL; zero or absent falls back to the default expiry
pub fn effective_ttl(ttl: Option<u64>) -> u64 {
    match ttl {
        Some(secs) if secs > 0 => secs,
        _ => DEFAULT_EXPIRY_SECONDS,
    }
}
