//! TTL cache for upstream GET responses.
//!
//! DESIGN
//! ======
//! Entries are keyed by `(method, path, sorted params)` so parameter order
//! never splits the cache. Reads check expiry lazily and evict on access; a
//! background sweep evicts whatever nobody reads again.
//!
//! Every `clear()` bumps a generation counter. A GET that was already in
//! flight when a mutation cleared the cache carries the old generation and
//! its response is not stored, so a read that raced a write never outlives
//! the write.
//!
//! TRADE-OFFS
//! ==========
//! Mutations to driveways or bookings clear the whole cache instead of the
//! affected keys. Availability, listings and booking lists all derive from
//! the same records, so targeted invalidation would have to know every
//! derived view; a full clear costs a few extra upstream reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

/// Path prefixes whose mutation invalidates the cache.
pub const INVALIDATING_PREFIXES: &[&str] = &["/driveways", "/bookings"];

// =============================================================================
// KEY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(method: &str, path: &str, params: &[(String, String)]) -> Self {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let query = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Self(format!("{} {path}?{query}", method.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether a request with this method and path must clear the cache.
#[must_use]
pub fn invalidates(method: &str, path: &str) -> bool {
    let mutating = matches!(method.to_ascii_uppercase().as_str(), "POST" | "PUT" | "PATCH" | "DELETE");
    mutating && INVALIDATING_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    hits: u64,
    misses: u64,
    generation: u64,
}

#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<CacheInner>>,
    default_ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner { entries: HashMap::new(), hits: 0, misses: 0, generation: 0 })),
            default_ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Option<serde_json::Value> {
        let mut inner = self.lock();
        let fresh = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        };
        if fresh.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        fresh
    }

    #[cfg(test)]
    pub(crate) fn insert_at(&self, key: CacheKey, value: serde_json::Value, ttl: Duration, now: Instant) {
        let mut inner = self.lock();
        inner.entries.insert(key, Entry { value, expires_at: now + ttl });
    }

    /// Current invalidation generation. Capture it before an upstream read.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `value` only if no `clear()` ran since `generation` was read.
    /// Returns whether the entry was stored.
    pub fn insert_if_generation(&self, key: CacheKey, value: serde_json::Value, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(key = key.as_str(), "stale response not cached");
            return false;
        }
        inner.entries.insert(key, Entry { value, expires_at: Instant::now() + self.default_ttl });
        true
    }

    /// Drop every entry and start a new generation.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.generation = inner.generation.wrapping_add(1);
        debug!(dropped, generation = inner.generation, "response cache cleared");
    }

    /// Evict expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at > now);
        before - inner.entries.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats { entries: inner.entries.len(), hits: inner.hits, misses: inner.misses }
    }
}

/// Spawn the periodic sweep. Returns a handle for shutdown.
pub fn spawn_sweep_task(cache: ResponseCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let evicted = cache.sweep();
            if evicted > 0 {
                debug!(evicted, "response cache sweep");
            }
        }
    })
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
