//! Memoization for expensive lookups.
//!
//! Entries are keyed by function identity plus serialized arguments and
//! carry their own time-to-live. The cache is an injectable [`Cache`]
//! owned by a [`crate::session::Session`]; there is no process-wide cache.

use anyhow::{Context, Result};
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    function: &'static str,
    args: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(function: &'static str, args: impl Into<String>) -> Self {
        Self {
            function,
            args: args.into(),
        }
    }

    #[must_use]
    pub fn function(&self) -> &'static str {
        self.function
    }
}

pub trait Cache: Send + Sync {
    /// Live value for `key`, if any.
    fn get(&self, key: &CacheKey) -> Option<Value>;

    fn put(&self, key: CacheKey, value: Value, ttl: Duration);

    fn invalidate(&self, key: &CacheKey);

    /// Drops every entry memoized for `function`.
    fn invalidate_function(&self, function: &'static str);

    fn clear(&self);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<Value> {
        None
    }

    fn put(&self, _key: CacheKey, _value: Value, _ttl: Duration) {}

    fn invalidate(&self, _key: &CacheKey) {}

    fn invalidate_function(&self, _function: &'static str) {}

    fn clear(&self) {}
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-memory TTL cache.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    capacity: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(10_000)
    }
}

impl MemoryCache {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!("Cache entry expired: {}({})", key.function, key.args);
            entries.remove(key);
        }
        None
    }

    fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let now = Instant::now();
            if entries.len() >= self.capacity {
                entries.retain(|_, entry| now < entry.expires_at);
                if entries.len() >= self.capacity {
                    entries.clear();
                }
            }
            entries.insert(
                key,
                Entry {
                    value,
                    expires_at: now + ttl,
                },
            );
        }
    }

    fn invalidate(&self, key: &CacheKey) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn invalidate_function(&self, function: &'static str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| key.function != function);
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Returns the cached value for `key`, computing and storing it on a miss.
///
/// A cached value that no longer deserializes into `T` counts as a miss.
pub fn cached<T, F>(cache: &dyn Cache, key: CacheKey, ttl: Duration, compute: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(hit) = cache.get(&key).and_then(|value| serde_json::from_value(value).ok()) {
        trace!("Cache hit: {}({})", key.function, key.args);
        return Ok(hit);
    }

    let value = compute()?;
    let json = serde_json::to_value(&value)
        .with_context(|| format!("Failed to cache result of {}", key.function))?;
    cache.put(key, json, ttl);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_cached_computes_once() -> Result<()> {
        let cache = MemoryCache::default();
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value: u32 = cached(&cache, CacheKey::new("answer", "x"), HOUR, || {
                calls.set(calls.get() + 1);
                Ok(42)
            })?;
            assert_eq!(value, 42);
        }

        assert_eq!(calls.get(), 1, "later calls should hit the cache");
        Ok(())
    }

    #[test]
    fn test_keys_distinguish_function_and_args() -> Result<()> {
        let cache = MemoryCache::default();

        let a: String = cached(&cache, CacheKey::new("f", "1"), HOUR, || Ok("f1".to_string()))?;
        let b: String = cached(&cache, CacheKey::new("f", "2"), HOUR, || Ok("f2".to_string()))?;
        let c: String = cached(&cache, CacheKey::new("g", "1"), HOUR, || Ok("g1".to_string()))?;

        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("f1", "f2", "g1"));
        assert_eq!(cache.len(), 3);
        Ok(())
    }

    #[test]
    fn test_expired_entry_is_recomputed() -> Result<()> {
        let cache = MemoryCache::default();
        let calls = Cell::new(0);

        for _ in 0..2 {
            let _: u8 = cached(&cache, CacheKey::new("short", ""), Duration::ZERO, || {
                calls.set(calls.get() + 1);
                Ok(1)
            })?;
        }

        assert_eq!(calls.get(), 2);
        Ok(())
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = MemoryCache::default();

        let first: Result<u8> = cached(&cache, CacheKey::new("flaky", ""), HOUR, || anyhow::bail!("boom"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<u8> = cached(&cache, CacheKey::new("flaky", ""), HOUR, || Ok(7));
        assert_eq!(second.unwrap(), 7);
    }

    #[test]
    fn test_invalidation() {
        let cache = MemoryCache::default();
        cache.put(CacheKey::new("f", "1"), Value::from(1), HOUR);
        cache.put(CacheKey::new("f", "2"), Value::from(2), HOUR);
        cache.put(CacheKey::new("g", "1"), Value::from(3), HOUR);

        cache.invalidate(&CacheKey::new("f", "1"));
        assert!(cache.get(&CacheKey::new("f", "1")).is_none());

        cache.invalidate_function("f");
        assert!(cache.get(&CacheKey::new("f", "2")).is_none());
        assert_eq!(cache.get(&CacheKey::new("g", "1")), Some(Value::from(3)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = MemoryCache::with_capacity(2);
        cache.put(CacheKey::new("f", "1"), Value::from(1), HOUR);
        cache.put(CacheKey::new("f", "2"), Value::from(2), HOUR);
        cache.put(CacheKey::new("f", "3"), Value::from(3), HOUR);

        assert!(cache.len() <= 2);
        assert_eq!(cache.get(&CacheKey::new("f", "3")), Some(Value::from(3)));
    }

    #[test]
    fn test_no_cache_always_computes() -> Result<()> {
        let calls = Cell::new(0);
        for _ in 0..2 {
            let _: u8 = cached(&NoCache, CacheKey::new("f", ""), HOUR, || {
                calls.set(calls.get() + 1);
                Ok(0)
            })?;
        }
        assert_eq!(calls.get(), 2);
        Ok(())
    }
}
