//! In-memory caching for platform API responses.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::domain::SourceId;
use crate::http_client::HttpMethod;

/// Defines the behavior of the in-memory cache for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present;
    /// otherwise, fetch from the network and write the response to the cache.
    #[default]
    Use,
    /// Always fetch from the network, bypassing any cached entry,
    /// and write the new response to the cache.
    Refresh,
    /// Always fetch from the network and do not read from or write to the cache.
    Bypass,
}

/// Request signature: SHA-256 over source, method, URL and sorted query params.
pub fn request_signature(
    source_id: &SourceId,
    method: HttpMethod,
    url: &str,
    params: &BTreeMap<String, String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(method.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(url.as_bytes());
    for (name, value) in params {
        hasher.update([0]);
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    source_id: SourceId,
    body: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    default_ttl: Duration,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Hit/miss counters since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe in-memory cache for API responses.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
    counters: Arc<CacheCounters>,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                default_ttl,
            })),
            counters: Arc::new(CacheCounters::default()),
        }
    }

    /// Create a cache store with a default TTL of 5 minutes.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(300))
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Return the payload for `key` if it has not expired.
    ///
    /// An expired entry is evicted and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let store = self.inner.read().await;
            match store.map.get(key) {
                Some(entry) if entry.is_live(now) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.body.clone());
                }
                Some(_) => {}
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let mut store = self.inner.write().await;
        if store
            .map
            .get(key)
            .is_some_and(|entry| !entry.is_live(Instant::now()))
        {
            store.map.remove(key);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `body` under `key` with `expiry = now + ttl`.
    ///
    /// If `ttl_override` is provided, it will be used instead of the default TTL.
    /// A zero TTL stores nothing.
    pub async fn put(
        &self,
        key: String,
        source_id: &SourceId,
        body: String,
        ttl_override: Option<Duration>,
    ) {
        let mut store = self.inner.write().await;
        let ttl = ttl_override.unwrap_or(store.default_ttl);
        if ttl == Duration::ZERO {
            return;
        }

        store.map.insert(
            key,
            CacheEntry {
                source_id: source_id.clone(),
                body,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove expired entries. Returns how many were evicted.
    pub async fn clear_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        let now = Instant::now();
        let before = store.map.len();
        store.map.retain(|_, entry| entry.is_live(now));
        before - store.map.len()
    }

    /// Drop every entry belonging to one source.
    pub async fn purge_source(&self, source_id: &SourceId) -> usize {
        let mut store = self.inner.write().await;
        let before = store.map.len();
        store.map.retain(|_, entry| &entry.source_id != source_id);
        before - store.map.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }

    /// Number of entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_disabled(&self) -> bool {
        self.inner.read().await.default_ttl == Duration::ZERO
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}
