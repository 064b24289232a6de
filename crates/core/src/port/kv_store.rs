// Key-Value Store Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// Byte-level key-value store behind the cache facade.
///
/// Implementations may scope every key under a fixed prefix; `keys` then
/// returns full store names, the way the underlying server reports them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write with an expiry in seconds
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    /// Write only when absent; returns whether the value was written
    async fn set_nx(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Returns false when the key does not exist
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Apply one expiry to many keys inside a single transaction
    async fn expire_many(&self, keys: &[String], ttl_secs: u64) -> Result<()>;

    /// Returns the number of removed keys
    async fn del(&self, key: &str) -> Result<u64>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Values in the same positions as `keys`
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()>;

    async fn sadd(&self, set: &str, members: &[String]) -> Result<u64>;

    async fn srem(&self, set: &str, members: &[String]) -> Result<u64>;

    async fn smembers(&self, set: &str) -> Result<Vec<String>>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Enumerate and delete every key matching `pattern` in one atomic
    /// server-side step. Returns the number of deleted keys.
    async fn delete_matching(&self, pattern: &str) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};

    /// Glob matching with the `*`, `?` and `[...]` syntax of the KEYS command.
    ///
    /// Backtracks on `*`, so it is only meant for small test fixtures.
    pub fn glob_match(pattern: &str, text: &str) -> bool {
        fn matches(p: &[char], t: &[char]) -> bool {
            match p.first() {
                None => t.is_empty(),
                Some('*') => (0..=t.len()).any(|i| matches(&p[1..], &t[i..])),
                Some('?') => !t.is_empty() && matches(&p[1..], &t[1..]),
                Some('[') => {
                    let Some(close) = p.iter().position(|c| *c == ']') else {
                        return t.first() == Some(&'[') && matches(&p[1..], &t[1..]);
                    };
                    let Some(c) = t.first() else {
                        return false;
                    };
                    let class = &p[1..close];
                    let (negate, class) = match class.first() {
                        Some('^') => (true, &class[1..]),
                        _ => (false, class),
                    };
                    let mut hit = false;
                    let mut i = 0;
                    while i < class.len() {
                        if i + 2 < class.len() && class[i + 1] == '-' {
                            hit |= class[i] <= *c && *c <= class[i + 2];
                            i += 3;
                        } else {
                            hit |= class[i] == *c;
                            i += 1;
                        }
                    }
                    hit != negate && matches(&p[close + 1..], &t[1..])
                }
                Some('\\') if p.len() > 1 => t.first() == Some(&p[1]) && matches(&p[2..], &t[1..]),
                Some(c) => t.first() == Some(c) && matches(&p[1..], &t[1..]),
            }
        }

        let p: Vec<char> = pattern.chars().collect();
        let t: Vec<char> = text.chars().collect();
        matches(&p, &t)
    }

    #[derive(Debug, Clone)]
    enum Entry {
        Bytes(Vec<u8>),
        Set(BTreeSet<String>),
    }

    #[derive(Default)]
    struct Shared {
        entries: BTreeMap<String, Entry>,
        ttls: BTreeMap<String, u64>,
        mget_calls: usize,
    }

    /// In-memory store; views created with `scoped` share the same data
    /// under a key prefix, like two clients on one server.
    #[derive(Clone, Default)]
    pub struct InMemoryKeyValueStore {
        shared: Arc<Mutex<Shared>>,
        prefix: String,
    }

    impl InMemoryKeyValueStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// A view on the same data with every key prefixed
        pub fn scoped(&self, prefix: impl Into<String>) -> Self {
            Self {
                shared: Arc::clone(&self.shared),
                prefix: prefix.into(),
            }
        }

        fn full(&self, key: &str) -> String {
            format!("{}{}", self.prefix, key)
        }

        /// Raw stored bytes under the full store name
        pub fn raw(&self, full_key: &str) -> Option<Vec<u8>> {
            match self.shared.lock().unwrap().entries.get(full_key) {
                Some(Entry::Bytes(b)) => Some(b.clone()),
                _ => None,
            }
        }

        /// Expiry last applied to the full store name
        pub fn ttl(&self, full_key: &str) -> Option<u64> {
            self.shared.lock().unwrap().ttls.get(full_key).copied()
        }

        pub fn mget_calls(&self) -> usize {
            self.shared.lock().unwrap().mget_calls
        }

        pub fn len(&self) -> usize {
            self.shared.lock().unwrap().entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    fn wrong_type(key: &str) -> AppError {
        AppError::Backend(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
            key
        ))
    }

    #[async_trait]
    impl KeyValueStore for InMemoryKeyValueStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            let key = self.full(key);
            match self.shared.lock().unwrap().entries.get(&key) {
                None => Ok(None),
                Some(Entry::Bytes(b)) => Ok(Some(b.clone())),
                Some(Entry::Set(_)) => Err(wrong_type(&key)),
            }
        }

        async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
            let key = self.full(key);
            let mut shared = self.shared.lock().unwrap();
            shared.entries.insert(key.clone(), Entry::Bytes(value));
            shared.ttls.insert(key, ttl_secs);
            Ok(())
        }

        async fn set_nx(&self, key: &str, value: Vec<u8>) -> Result<bool> {
            let key = self.full(key);
            let mut shared = self.shared.lock().unwrap();
            if shared.entries.contains_key(&key) {
                return Ok(false);
            }
            shared.entries.insert(key, Entry::Bytes(value));
            Ok(true)
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
            let key = self.full(key);
            let mut shared = self.shared.lock().unwrap();
            if !shared.entries.contains_key(&key) {
                return Ok(false);
            }
            shared.ttls.insert(key, ttl_secs);
            Ok(true)
        }

        async fn expire_many(&self, keys: &[String], ttl_secs: u64) -> Result<()> {
            let full: Vec<String> = keys.iter().map(|k| self.full(k)).collect();
            let mut shared = self.shared.lock().unwrap();
            for key in full {
                if shared.entries.contains_key(&key) {
                    shared.ttls.insert(key, ttl_secs);
                }
            }
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<u64> {
            let key = self.full(key);
            let mut shared = self.shared.lock().unwrap();
            shared.ttls.remove(&key);
            Ok(shared.entries.remove(&key).map(|_| 1).unwrap_or(0))
        }

        async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
            let pattern = self.full(pattern);
            let shared = self.shared.lock().unwrap();
            Ok(shared
                .entries
                .keys()
                .filter(|k| glob_match(&pattern, k))
                .cloned()
                .collect())
        }

        async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
            let mut shared = self.shared.lock().unwrap();
            shared.mget_calls += 1;
            Ok(keys
                .iter()
                .map(|k| match shared.entries.get(&self.full(k)) {
                    Some(Entry::Bytes(b)) => Some(b.clone()),
                    _ => None,
                })
                .collect())
        }

        async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
            let mut shared = self.shared.lock().unwrap();
            for (key, value) in entries {
                let key = self.full(&key);
                shared.ttls.remove(&key);
                shared.entries.insert(key, Entry::Bytes(value));
            }
            Ok(())
        }

        async fn sadd(&self, set: &str, members: &[String]) -> Result<u64> {
            let key = self.full(set);
            let mut shared = self.shared.lock().unwrap();
            let entry = shared
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::Set(BTreeSet::new()));
            match entry {
                Entry::Set(s) => Ok(members.iter().filter(|m| s.insert((*m).clone())).count() as u64),
                Entry::Bytes(_) => Err(wrong_type(&key)),
            }
        }

        async fn srem(&self, set: &str, members: &[String]) -> Result<u64> {
            let key = self.full(set);
            let mut shared = self.shared.lock().unwrap();
            match shared.entries.get_mut(&key) {
                None => Ok(0),
                Some(Entry::Set(s)) => Ok(members.iter().filter(|m| s.remove(*m)).count() as u64),
                Some(Entry::Bytes(_)) => Err(wrong_type(&key)),
            }
        }

        async fn smembers(&self, set: &str) -> Result<Vec<String>> {
            let key = self.full(set);
            match self.shared.lock().unwrap().entries.get(&key) {
                None => Ok(Vec::new()),
                Some(Entry::Set(s)) => Ok(s.iter().cloned().collect()),
                Some(Entry::Bytes(_)) => Err(wrong_type(&key)),
            }
        }

        async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
            let key = self.full(key);
            let mut shared = self.shared.lock().unwrap();
            let current = match shared.entries.get(&key) {
                None => 0,
                Some(Entry::Bytes(b)) => std::str::from_utf8(b)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        AppError::Backend("value is not an integer or out of range".to_string())
                    })?,
                Some(Entry::Set(_)) => return Err(wrong_type(&key)),
            };
            let next = current + delta;
            shared
                .entries
                .insert(key, Entry::Bytes(next.to_string().into_bytes()));
            Ok(next)
        }

        async fn delete_matching(&self, pattern: &str) -> Result<u64> {
            let pattern = self.full(pattern);
            let mut shared = self.shared.lock().unwrap();
            let doomed: Vec<String> = shared
                .entries
                .keys()
                .filter(|k| glob_match(&pattern, k))
                .cloned()
                .collect();
            for key in &doomed {
                shared.entries.remove(key);
                shared.ttls.remove(key);
            }
            Ok(doomed.len() as u64)
        }
    }
}
