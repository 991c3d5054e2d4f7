//! Degraded-mode response cache.
//!
//! Holds the last good (or a synthesized) response per call key so that a
//! caller can still answer while its dependency is unavailable.
//!
//! # Eviction
//! - expire-after-write: per-entry TTL, defaulting to the configured one
//! - expire-after-access: entries idle longer than the configured window
//! - maximum total weight: least recently used entries go first
//! - explicit invalidation
//!
//! Expired entries are dropped when read, and `put` trims expired entries
//! from the least recently used end only.
//!
//! Every eviction is counted, reported to metrics, and passed to the optional
//! listener after the internal lock is released.

use lru::LruCache;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::FallbackCacheConfig;
use crate::observability::metrics;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCause {
    Expired,
    Size,
    Explicit,
    Replaced,
}

impl EvictionCause {
    fn label(self) -> &'static str {
        match self {
            EvictionCause::Expired => "expired",
            EvictionCause::Size => "size",
            EvictionCause::Explicit => "explicit",
            EvictionCause::Replaced => "replaced",
        }
    }
}

/// Callback invoked for every removed entry.
pub type EvictionListener = Arc<dyn Fn(&str, EvictionCause) + Send + Sync>;

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions_expired: u64,
    pub evictions_size: u64,
    pub evictions_explicit: u64,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
    last_access: Instant,
    weight: u64,
}

struct Inner {
    entries: LruCache<String, Entry>,
    total_weight: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    size: AtomicU64,
    explicit: AtomicU64,
}

/// Bounded fallback cache shared by every resilient call.
pub struct FallbackCache {
    expire_after_write: Duration,
    expire_after_access: Option<Duration>,
    max_weight: u64,
    inner: Mutex<Inner>,
    counters: Counters,
    listener: Option<EvictionListener>,
}

impl std::fmt::Debug for FallbackCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackCache")
            .field("max_weight", &self.max_weight)
            .field("stats", &self.stats())
            .finish()
    }
}

impl FallbackCache {
    pub fn new(config: &FallbackCacheConfig) -> Self {
        Self {
            expire_after_write: config.expire_after_write(),
            expire_after_access: config.expire_after_access(),
            max_weight: config.max_weight,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                total_weight: 0,
            }),
            counters: Counters::default(),
            listener: None,
        }
    }

    /// Attach an eviction listener.
    pub fn with_listener(mut self, listener: EvictionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        if now >= entry.expires_at {
            return true;
        }
        match self.expire_after_access {
            Some(idle) => now.saturating_duration_since(entry.last_access) >= idle,
            None => false,
        }
    }

    fn notify(&self, evicted: Vec<(String, EvictionCause)>) {
        for (key, cause) in evicted {
            match cause {
                EvictionCause::Expired => self.counters.expired.fetch_add(1, Ordering::Relaxed),
                EvictionCause::Size => self.counters.size.fetch_add(1, Ordering::Relaxed),
                EvictionCause::Explicit => self.counters.explicit.fetch_add(1, Ordering::Relaxed),
                EvictionCause::Replaced => 0,
            };
            metrics::record_cache_eviction(cause.label());
            tracing::debug!(key = %key, cause = cause.label(), "Fallback entry evicted");
            if let Some(listener) = &self.listener {
                listener(&key, cause);
            }
        }
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        let found = {
            let mut inner = self.lock();
            let expired = match inner.entries.peek(key) {
                Some(entry) => self.is_expired(entry, now),
                None => false,
            };
            if expired {
                if let Some(entry) = inner.entries.pop(key) {
                    inner.total_weight -= entry.weight;
                    evicted.push((key.to_string(), EvictionCause::Expired));
                }
                None
            } else {
                inner.entries.get_mut(key).map(|entry| {
                    entry.last_access = now;
                    entry.value.clone()
                })
            }
        };

        self.notify(evicted);
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit();
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_miss();
        }
        found
    }

    /// Look up and decode a live entry. An undecodable entry counts as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Fallback entry has unexpected shape");
                None
            }
        }
    }

    /// Store an entry. `ttl` overrides the default expire-after-write.
    ///
    /// Returns `false` when the entry alone outweighs the cache. Any older
    /// entry under the same key is dropped in that case.
    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>, weight: u64) -> bool {
        let key = key.into();
        if weight > self.max_weight {
            tracing::warn!(key = %key, weight, max_weight = self.max_weight, "Fallback entry too heavy to cache");
            let removed = {
                let mut inner = self.lock();
                match inner.entries.pop(&key) {
                    Some(old) => {
                        inner.total_weight -= old.weight;
                        true
                    }
                    None => false,
                }
            };
            if removed {
                self.notify(vec![(key, EvictionCause::Replaced)]);
            }
            return false;
        }

        let now = Instant::now();
        let mut evicted = Vec::new();
        {
            let mut inner = self.lock();
            let entry = Entry {
                value,
                expires_at: now + ttl.unwrap_or(self.expire_after_write),
                last_access: now,
                weight,
            };
            if let Some(old) = inner.entries.put(key.clone(), entry) {
                inner.total_weight -= old.weight;
                evicted.push((key.clone(), EvictionCause::Replaced));
            }
            inner.total_weight += weight;

            // 1. Drop expired entries from the cold end
            while let Some((_, oldest)) = inner.entries.peek_lru() {
                if !self.is_expired(oldest, now) {
                    break;
                }
                if let Some((k, e)) = inner.entries.pop_lru() {
                    inner.total_weight -= e.weight;
                    evicted.push((k, EvictionCause::Expired));
                }
            }

            // 2. Then the least recently used until under the weight bound
            while inner.total_weight > self.max_weight {
                match inner.entries.pop_lru() {
                    Some((k, e)) => {
                        inner.total_weight -= e.weight;
                        evicted.push((k, EvictionCause::Size));
                    }
                    None => break,
                }
            }
        }

        self.notify(evicted);
        true
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = {
            let mut inner = self.lock();
            match inner.entries.pop(key) {
                Some(e) => {
                    inner.total_weight -= e.weight;
                    true
                }
                None => false,
            }
        };
        if removed {
            self.notify(vec![(key.to_string(), EvictionCause::Explicit)]);
        }
        removed
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        let evicted: Vec<_> = {
            let mut inner = self.lock();
            inner.total_weight = 0;
            let mut keys = Vec::with_capacity(inner.entries.len());
            while let Some((k, _)) = inner.entries.pop_lru() {
                keys.push((k, EvictionCause::Explicit));
            }
            keys
        };
        self.notify(evicted);
    }

    /// Entries currently stored, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn weighted_size(&self) -> u64 {
        self.lock().total_weight
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions_expired: self.counters.expired.load(Ordering::Relaxed),
            evictions_size: self.counters.size.load(Ordering::Relaxed),
            evictions_explicit: self.counters.explicit.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(max_weight: u64, write_ms: u64, access_ms: u64) -> FallbackCache {
        FallbackCache::new(&FallbackCacheConfig {
            expire_after_write_ms: write_ms,
            expire_after_access_ms: access_ms,
            max_weight,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_and_miss_counters() {
        let cache = cache(10, 60_000, 0);
        assert!(cache.get("getBooking:1").is_none());
        cache.put("getBooking:1", json!({"id": 1}), None, 1);
        assert_eq!(cache.get("getBooking:1"), Some(json!({"id": 1})));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_after_write() {
        let cache = cache(10, 1_000, 0);
        cache.put("a", json!(1), None, 1);
        cache.put("b", json!(2), Some(Duration::from_secs(5)), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.stats().evictions_expired, 1);
        assert_eq!(cache.weighted_size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_after_access() {
        let cache = cache(10, 60_000, 1_000);
        cache.put("a", json!(1), None, 1);

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(cache.get("a").is_some());
        // The read above restarted the idle clock.
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(cache.get("a").is_some());
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(cache.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_weight_bound_evicts_least_recently_used() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let cache = cache(5, 60_000, 0).with_listener(Arc::new(move |key: &str, cause: EvictionCause| {
            sink.lock().unwrap().push((key.to_string(), cause));
        }));

        cache.put("a", json!("a"), None, 2);
        cache.put("b", json!("b"), None, 2);
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c", json!("c"), None, 2);

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert_eq!(cache.weighted_size(), 4);
        assert_eq!(cache.stats().evictions_size, 1);
        assert_eq!(
            evicted.lock().unwrap().as_slice(),
            &[("b".to_string(), EvictionCause::Size)]
        );
    }

    #[tokio::test]
    async fn test_replace_and_invalidate() {
        let cache = cache(10, 60_000, 0);
        cache.put("k", json!(1), None, 3);
        cache.put("k", json!(2), None, 4);
        assert_eq!(cache.weighted_size(), 4);
        assert_eq!(cache.get_as::<i32>("k"), Some(2));

        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions_explicit, 1);
    }

    #[tokio::test]
    async fn test_oversized_entry_rejected() {
        let cache = cache(3, 60_000, 0);
        assert!(!cache.put("big", json!("x"), None, 4));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_entry_drops_older_value() {
        let cache = cache(3, 60_000, 0);
        assert!(cache.put("getRoom:9", json!("old"), None, 1));
        assert!(!cache.put("getRoom:9", json!("new"), None, 4));

        assert!(cache.get("getRoom:9").is_none());
        assert_eq!(cache.weighted_size(), 0);
        assert_eq!(cache.stats().evictions_explicit, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_trims_expired_tail_only() {
        let cache = cache(10, 60_000, 0);
        cache.put("short", json!(1), Some(Duration::from_secs(1)), 1);
        cache.put("long", json!(2), None, 1);
        cache.put("middle", json!(3), Some(Duration::from_secs(1)), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.put("fresh", json!(4), None, 1);

        // "short" sat at the cold end; "middle" is behind a live entry.
        assert_eq!(cache.stats().evictions_expired, 1);
        assert_eq!(cache.len(), 3);

        assert!(cache.get("middle").is_none());
        assert_eq!(cache.stats().evictions_expired, 2);
        assert_eq!(cache.weighted_size(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = cache(10, 60_000, 0);
        cache.put("a", json!(1), None, 1);
        cache.put("b", json!(2), None, 1);
        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.weighted_size(), 0);
        assert_eq!(cache.stats().evictions_explicit, 2);
    }
}
