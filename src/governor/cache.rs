//! Short-TTL cache for successful GET responses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Method;
use serde_json::Value;
use tokio::time::Instant;

const SWEEP_THRESHOLD: usize = 1024;

/// A cached response body and when it was stored.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Value,
    pub stored_at: Instant,
}

impl CachedResponse {
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.stored_at) < ttl
    }
}

/// Cache keyed by `METHOD path`.
///
/// Every invalidation bumps `generation`. A GET that started under an older
/// generation must not store its body.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    generation: AtomicU64,
    ttl: Duration,
}

pub fn cache_key(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Fresh body for `path`, evicting it if it has expired.
    pub fn get(&self, path: &str, now: Instant) -> Option<Value> {
        let key = cache_key(&Method::GET, path);
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_fresh(now, self.ttl) {
                return Some(entry.body.clone());
            }
        }
        self.entries
            .remove_if(&key, |_, cached| !cached.is_fresh(now, self.ttl));
        None
    }

    pub fn insert(&self, path: &str, body: Value, now: Instant) {
        self.entries.insert(
            cache_key(&Method::GET, path),
            CachedResponse {
                body,
                stored_at: now,
            },
        );
        self.sweep(now);
    }

    /// Expired entries are only evicted on read; drop them in bulk once the map grows.
    fn sweep(&self, now: Instant) {
        if self.entries.len() > SWEEP_THRESHOLD {
            self.entries.retain(|_, cached| cached.is_fresh(now, self.ttl));
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store `body` unless an invalidation happened since `generation` was read.
    pub fn insert_if_current(&self, path: &str, body: Value, now: Instant, generation: u64) -> bool {
        // Holding the shard lock orders this against the remove in `invalidate`.
        let entry = self.entries.entry(cache_key(&Method::GET, path));
        if self.generation() != generation {
            return false;
        }
        let cached = CachedResponse {
            body,
            stored_at: now,
        };
        match entry {
            Entry::Occupied(mut slot) => {
                slot.insert(cached);
            }
            Entry::Vacant(slot) => {
                slot.insert(cached);
            }
        }
        self.sweep(now);
        true
    }

    /// Drop the cached GET for `path`; returns whether one existed.
    pub fn invalidate(&self, path: &str) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(&cache_key(&Method::GET, path)).is_some()
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_operations() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let now = Instant::now();

        assert!(cache.get("/sessions", now).is_none());

        cache.insert("/sessions", json!([{ "id": "s-1" }]), now);
        assert_eq!(
            cache.get("/sessions", now + Duration::from_secs(59)),
            Some(json!([{ "id": "s-1" }]))
        );

        // Expired entries are evicted on read
        assert!(cache.get("/sessions", now + Duration::from_secs(60)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let now = Instant::now();
        cache.insert("/profiles/me", json!({ "id": "p-1" }), now);
        cache.insert("/sessions", json!([]), now);

        assert!(cache.invalidate("/profiles/me"));
        assert!(!cache.invalidate("/profiles/me"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation_outdates_in_flight_insert() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let now = Instant::now();

        let before = cache.generation();
        cache.invalidate("/sessions/s-1");
        assert!(!cache.insert_if_current("/sessions/s-1", json!({ "status": "scheduled" }), now, before));
        assert!(cache.get("/sessions/s-1", now).is_none());

        let current = cache.generation();
        assert!(cache.insert_if_current("/sessions/s-1", json!({ "status": "cancelled" }), now, current));
        assert_eq!(
            cache.get("/sessions/s-1", now),
            Some(json!({ "status": "cancelled" }))
        );

        cache.clear();
        assert_ne!(cache.generation(), current);
    }

    #[test]
    fn test_expired_entries_swept_when_large() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let now = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            cache.insert(&format!("/sessions/s-{}", i), json!({}), now);
        }
        assert_eq!(cache.len(), SWEEP_THRESHOLD);

        let later = now + Duration::from_secs(61);
        cache.insert("/profiles/me", json!({ "id": "p-1" }), later);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_includes_method() {
        assert_eq!(cache_key(&Method::GET, "/sessions"), "GET /sessions");
        assert_ne!(
            cache_key(&Method::GET, "/sessions"),
            cache_key(&Method::POST, "/sessions")
        );
    }
}
