//! In-memory key/value cache with per-entry time-to-live.
//!
//! Expiry is lazy: an entry is only checked when it is read through
//! [`ExpiringCache::get`] or [`ExpiringCache::has`]. [`ExpiringCache::cleanup`]
//! sweeps every expired entry and is run by the scheduler's `cache-sweep` job.
//! There is no capacity bound.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expiry: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expiry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

pub struct ExpiringCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expiry = Instant::now() + ttl;
        self.entries().insert(key.into(), Entry { value, expiry });
    }

    /// Returns the value if present and not expired. An expired entry is
    /// evicted on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries();
        let entry = entries.get(key)?;
        if !entry.is_expired(Instant::now()) {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            None => return false,
            Some(entry) => entry.is_expired(Instant::now()),
        };
        if expired {
            entries.remove(key);
        }
        !expired
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Evicts all expired entries and returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries();
        let expired = entries.values().filter(|e| e.is_expired(now)).count();
        CacheStats {
            total: entries.len(),
            active: entries.len() - expired,
            expired,
        }
    }
}

impl<V: Clone> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_ttl() {
        let cache = ExpiringCache::new();
        cache.set("k", 42, Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some(42));
        assert!(cache.has("k"));

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
        // lazily evicted by the read
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_alive_at_exact_expiry() {
        let cache = ExpiringCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_cleanup() {
        let cache = ExpiringCache::new();
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(2)).await;

        // stats does not evict
        assert_eq!(
            cache.stats(),
            CacheStats {
                total: 2,
                active: 1,
                expired: 1
            }
        );
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
        assert_eq!(cache.stats().expired, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_write_wins_and_resets_ttl() {
        let cache = ExpiringCache::new();
        cache.set("k", 1, Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(900)).await;
        cache.set("k", 2, Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(900)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = ExpiringCache::new();
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(60));
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("b"), None);
    }
}
