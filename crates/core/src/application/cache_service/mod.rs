// Cache Service - Compressed facade over a key-value store

pub mod bulk;
pub mod memoize;
pub mod pattern;

pub use memoize::CachedFn;
pub use pattern::validate_delete_pattern;

use crate::domain::cache::effective_ttl;
use crate::error::{AppError, Result};
use crate::port::{CompressionCodec, KeyValueStore};
use std::sync::Arc;
use tracing::debug;

/// Cache facade.
///
/// Holds two handles onto the same server: `store` scopes every key under the
/// service name, `global_store` sees keys verbatim. Values written through the
/// value operations are always compressed and always decompressed on read.
#[derive(Clone)]
pub struct CacheService {
    service_name: String,
    store: Arc<dyn KeyValueStore>,
    global_store: Arc<dyn KeyValueStore>,
    codec: Arc<dyn CompressionCodec>,
}

impl CacheService {
    /// # Errors
    /// - AppError::Config if `service_name` is empty
    pub fn new(
        service_name: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        global_store: Arc<dyn KeyValueStore>,
        codec: Arc<dyn CompressionCodec>,
    ) -> Result<Self> {
        let service_name = service_name.into();
        if service_name.trim().is_empty() {
            return Err(AppError::Config("Service name is required".to_string()));
        }
        Ok(Self {
            service_name,
            store,
            global_store,
            codec,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn encode(&self, value: &str) -> Vec<u8> {
        self.codec.compress(value.as_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        let raw = self.codec.uncompress(bytes)?;
        String::from_utf8(raw).map_err(|e| AppError::Codec(format!("invalid UTF-8: {}", e)))
    }

    fn decode_opt(&self, bytes: Option<Vec<u8>>) -> Result<Option<String>> {
        bytes.map(|b| self.decode(&b)).transpose()
    }

    /// Value stored under `key`, or None when absent
    pub async fn get_key(&self, key: &str) -> Result<Option<String>> {
        let data = self.store.get(key).await?;
        debug!(key = key, hit = data.is_some(), "Cache GET");
        self.decode_opt(data)
    }

    /// Raw bytes under `key`, without decompression
    pub async fn get_uncompressed_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store.get(key).await
    }

    /// Full store names of the service keys matching `pattern`
    pub async fn get_keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        self.store.keys(pattern).await
    }

    /// Compress and store `value`; `ttl` in seconds, defaults to two hours
    pub async fn set_key(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        let ttl = effective_ttl(ttl);
        self.store.set_ex(key, self.encode(value), ttl).await?;
        debug!(key = key, ttl_secs = ttl, "Cache SET");
        Ok(())
    }

    pub async fn get_global_key(&self, key: &str) -> Result<Option<String>> {
        let data = self.global_store.get(key).await?;
        debug!(key = key, hit = data.is_some(), "Global cache GET");
        self.decode_opt(data)
    }

    pub async fn set_global_key(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        let ttl = effective_ttl(ttl);
        self.global_store.set_ex(key, self.encode(value), ttl).await?;
        debug!(key = key, ttl_secs = ttl, "Global cache SET");
        Ok(())
    }

    /// Store `value` only when `key` is absent (no expiry)
    pub async fn set_key_if_not_exists(&self, key: &str, value: &str) -> Result<bool> {
        self.store.set_nx(key, self.encode(value)).await
    }

    /// Returns false when the key does not exist
    pub async fn set_key_ttl(&self, key: &str, ttl: u64) -> Result<bool> {
        self.store.expire(key, ttl).await
    }

    pub async fn remove_key(&self, key: &str) -> Result<u64> {
        self.store.del(key).await
    }

    pub async fn add_elems_to_set(&self, set: &str, members: &[String]) -> Result<u64> {
        self.store.sadd(set, members).await
    }

    pub async fn remove_elems_from_set(&self, set: &str, members: &[String]) -> Result<u64> {
        self.store.srem(set, members).await
    }

    pub async fn get_elems_in_set(&self, set: &str) -> Result<Vec<String>> {
        self.store.smembers(set).await
    }

    /// Counter stored as a plain integer; a missing key starts at zero
    pub async fn increment_key_by_value(&self, key: &str, delta: i64) -> Result<i64> {
        self.store.incr_by(key, delta).await
    }
}
