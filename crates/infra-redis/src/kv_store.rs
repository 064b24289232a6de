// Redis KeyValueStore Implementation

use crate::error::map_redis_error;
use crate::scripts::DELETE_MATCHING;
use async_trait::async_trait;
use qcache_core::error::Result;
use qcache_core::port::KeyValueStore;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;

/// Byte-level store over one Redis connection.
///
/// With a non-empty prefix every key is stored as `{prefix}{key}`; the
/// cache facade uses one prefixed handle per service and one bare handle for
/// the global namespace.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn: ConnectionManager,
    prefix: String,
    delete_script: Script,
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore")
            .field("conn", &"ConnectionManager")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RedisKeyValueStore {
    /// Handle that sees keys verbatim
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_prefix(conn, "")
    }

    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            delete_script: Script::new(DELETE_MATCHING),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", e))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SET", e))?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let written: bool = redis::cmd("SETNX")
            .arg(self.key(key))
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SETNX", e))?;
        Ok(written)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = redis::cmd("EXPIRE")
            .arg(self.key(key))
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("EXPIRE", e))?;
        Ok(applied)
    }

    async fn expire_many(&self, keys: &[String], ttl_secs: u64) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.cmd("EXPIRE").arg(self.key(key)).arg(ttl_secs).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("MULTI/EXPIRE", e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("DEL", e))?;
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(self.key(pattern))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("KEYS", e))?;
        Ok(keys)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let full: Vec<String> = keys.iter().map(|k| self.key(k)).collect();

        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(&full)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("MGET", e))?;
        debug!(keys = keys.len(), "Redis MGET");
        Ok(values)
    }

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (key, value) in entries {
            cmd.arg(self.key(&key)).arg(value);
        }

        let mut conn = self.conn.clone();
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("MSET", e))?;
        Ok(())
    }

    async fn sadd(&self, set: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let added: u64 = redis::cmd("SADD")
            .arg(self.key(set))
            .arg(members)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SADD", e))?;
        Ok(added)
    }

    async fn srem(&self, set: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("SREM")
            .arg(self.key(set))
            .arg(members)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SREM", e))?;
        Ok(removed)
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.key(set))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SMEMBERS", e))?;
        Ok(members)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCRBY")
            .arg(self.key(key))
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("INCRBY", e))?;
        Ok(value)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let deleted: u64 = self
            .delete_script
            .arg(self.key(pattern))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("EVALSHA delete-matching", e))?;
        debug!(pattern = pattern, deleted = deleted, "Redis pattern DEL");
        Ok(deleted)
    }
}
