// Multi-key and TTL operations

use super::CacheService;
use crate::domain::cache::{effective_ttl, DEFAULT_MGET_BATCH_SIZE};
use crate::error::{AppError, Result};
use futures::future::try_join_all;
use tracing::debug;

impl CacheService {
    /// Apply one expiry to every key in a single MULTI/EXEC.
    ///
    /// Redis queues all commands or none, but does not roll back the ones
    /// that already ran if a single EXPIRE fails inside EXEC.
    pub async fn set_key_ttls(&self, keys: &[String], ttl: Option<u64>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let ttl = effective_ttl(ttl);
        self.store.expire_many(keys, ttl).await?;
        debug!(count = keys.len(), ttl_secs = ttl, "Cache EXPIRE batch");
        Ok(())
    }

    /// Decompressed values in the positions of `keys`
    pub async fn get_values(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.store.mget(keys).await?;
        raw.into_iter().map(|v| self.decode_opt(v)).collect()
    }

    /// Same result as `get_values`, with one multi-get per chunk of at most
    /// `batch_size` keys (100 when None). Chunks are requested concurrently.
    pub async fn get_values_in_batches(
        &self,
        keys: &[String],
        batch_size: Option<usize>,
    ) -> Result<Vec<Option<String>>> {
        let batch_size = batch_size.unwrap_or(DEFAULT_MGET_BATCH_SIZE);
        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let chunks =
            try_join_all(keys.chunks(batch_size).map(|chunk| self.store.mget(chunk))).await?;
        debug!(keys = keys.len(), chunks = chunks.len(), "Cache MGET in batches");

        chunks
            .into_iter()
            .flatten()
            .map(|v| self.decode_opt(v))
            .collect()
    }

    /// Compress and write `values[i]` under `keys[i]`, then expire all keys
    pub async fn set_values(
        &self,
        keys: &[String],
        values: &[String],
        ttl: Option<u64>,
    ) -> Result<()> {
        if keys.len() != values.len() {
            return Err(AppError::Validation(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let entries = keys
            .iter()
            .zip(values)
            .map(|(k, v)| (k.clone(), self.encode(v)))
            .collect();
        self.store.mset(entries).await?;
        self.set_key_ttls(keys, ttl).await
    }
}
