// Function-result memoization

use super::CacheService;
use crate::domain::CacheFnOptions;
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tracing::debug;

/// A function whose results are cached as JSON under generated keys.
///
/// Created by `CacheService::cache_fn`. Concurrent misses on the same key all
/// run the wrapped function; each writes the cache once.
pub struct CachedFn<F, K> {
    cache: CacheService,
    func: F,
    key_generator: K,
    ttl: u64,
    options: CacheFnOptions,
}

impl CacheService {
    /// Wrap `func` so its results are cached for `ttl` seconds.
    ///
    /// `key_generator` maps the call arguments to a sub-key; returning `None`
    /// (or an empty string) bypasses the cache for that call.
    ///
    /// # Example
    /// ```text
    /// let profile = cache.cache_fn(
    ///     |id: u64| async move { load_profile(id).await },
    ///     |id: &u64| { let id = *id; async move { Some(id.to_string()) } },
    ///     600,
    ///     CacheFnOptions::default(),
    /// )?;
    /// let p = profile.call(42).await?;
    /// ```
    pub fn cache_fn<F, K>(
        &self,
        func: F,
        key_generator: K,
        ttl: u64,
        options: CacheFnOptions,
    ) -> Result<CachedFn<F, K>> {
        if ttl == 0 {
            return Err(AppError::Validation(
                "cache_fn needs a positive ttl".to_string(),
            ));
        }
        Ok(CachedFn {
            cache: self.clone(),
            func,
            key_generator,
            ttl,
            options,
        })
    }
}

impl<F, K> CachedFn<F, K> {
    pub async fn call<A, T, Fut, KFut>(&self, args: A) -> Result<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T>>,
        K: Fn(&A) -> KFut,
        KFut: Future<Output = Option<String>>,
        T: Serialize + DeserializeOwned,
    {
        let key = match (self.key_generator)(&args).await {
            Some(sub_key) if !sub_key.is_empty() => {
                format!("{}{}", self.options.key_prefix, sub_key)
            }
            _ => return (self.func)(args).await,
        };

        let cached = if self.options.is_global {
            self.cache.get_global_key(&key).await?
        } else {
            self.cache.get_key(&key).await?
        };
        if let Some(serialized) = cached {
            debug!(key = %key, "cache_fn hit");
            return Ok(serde_json::from_str(&serialized)?);
        }

        debug!(key = %key, "cache_fn miss");
        let data = (self.func)(args).await?;
        let serialized = serde_json::to_string(&data)?;
        if self.options.is_global {
            self.cache
                .set_global_key(&key, &serialized, Some(self.ttl))
                .await?;
        } else {
            self.cache.set_key(&key, &serialized, Some(self.ttl)).await?;
        }
        Ok(data)
    }
}
