//! Byte-bounded LRU response cache.
//!
//! # Responsibilities
//! - Map request URLs to captured origin responses
//! - Enforce a per-item and a total byte limit
//! - Evict least-recently-used entries to make room
//! - Track hit counters for reporting
//!
//! # Design Decisions
//! - One mutex serializes every operation; only bookkeeping runs under it,
//!   never I/O
//! - Payloads are `bytes::Bytes`, so `get` hands back a reference-counted
//!   clone instead of copying the response
//! - `total_bytes` is maintained incrementally and always equals the sum of
//!   stored item sizes
//! - A put that cannot be satisfied even after draining the history is
//!   refused rather than admitted over budget

use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::cache::deque::IndexedDeque;

/// Rejected cache limits, fatal at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLimitsError {
    /// `max_item_size` exceeds `max_total_size`; no item could ever fit.
    ItemLargerThanTotal {
        max_item_size: usize,
        max_total_size: usize,
    },
    /// A zero limit would reject every insert.
    ZeroLimit,
}

impl std::fmt::Display for CacheLimitsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheLimitsError::ItemLargerThanTotal {
                max_item_size,
                max_total_size,
            } => write!(
                f,
                "max_item_size ({}) exceeds max_total_size ({})",
                max_item_size, max_total_size
            ),
            CacheLimitsError::ZeroLimit => write!(f, "cache limits must be greater than zero"),
        }
    }
}

impl std::error::Error for CacheLimitsError {}

/// A captured response and its bookkeeping.
struct CacheItem {
    payload: Bytes,
    size: usize,
    stored_at: Instant,
}

/// Point-in-time counters, taken under the cache lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub success_hits: u64,
    /// All lookups, hit or miss.
    pub total_hits: u64,
    /// Entries currently stored.
    pub item_count: usize,
    /// Bytes currently stored.
    pub total_bytes: usize,
}

/// State guarded by the cache mutex.
struct CacheInner {
    index: HashMap<String, CacheItem>,
    /// Keys ordered most-recently-used first.
    history: IndexedDeque<String>,
    success_hits: u64,
    total_hits: u64,
    total_bytes: usize,
}

/// Thread-safe LRU cache keyed by request URL.
pub struct LruCache {
    inner: Mutex<CacheInner>,
    max_item_size: usize,
    max_total_size: usize,
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("LruCache")
            .field("max_item_size", &self.max_item_size)
            .field("max_total_size", &self.max_total_size)
            .field("items", &stats.item_count)
            .field("bytes", &stats.total_bytes)
            .finish()
    }
}

impl LruCache {
    /// Create a cache with the given limits.
    ///
    /// Fails when `max_item_size > max_total_size` or either limit is zero.
    pub fn new(max_item_size: usize, max_total_size: usize) -> Result<Self, CacheLimitsError> {
        if max_item_size == 0 || max_total_size == 0 {
            return Err(CacheLimitsError::ZeroLimit);
        }
        if max_item_size > max_total_size {
            return Err(CacheLimitsError::ItemLargerThanTotal {
                max_item_size,
                max_total_size,
            });
        }
        Ok(Self {
            inner: Mutex::new(CacheInner {
                index: HashMap::new(),
                history: IndexedDeque::new(),
                success_hits: 0,
                total_hits: 0,
                total_bytes: 0,
            }),
            max_item_size,
            max_total_size,
        })
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    ///
    /// Every call with a non-empty key counts toward `total_hits`.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if key.is_empty() {
            return None;
        }
        let mut inner = self.inner.lock();
        inner.total_hits += 1;
        let payload = inner.index.get(key)?.payload.clone();
        inner.success_hits += 1;
        inner.history.bubble(key);
        Some(payload)
    }

    /// Store `value` under `key`, evicting from the LRU end as needed.
    ///
    /// Returns `false` for an empty key, an empty value, a value over the
    /// per-item limit, or when eviction cannot free enough room.
    pub fn put(&self, key: &str, value: Bytes) -> bool {
        let size = value.len();
        if key.is_empty() || size == 0 || size > self.max_item_size {
            return false;
        }
        let mut inner = self.inner.lock();
        while inner.total_bytes + size > self.max_total_size {
            let victim = match inner.history.pop_back() {
                Some(victim) => victim,
                None => break,
            };
            if let Some(evicted) = inner.index.remove(&victim) {
                inner.total_bytes -= evicted.size;
                tracing::debug!(
                    key = %victim,
                    bytes = evicted.size,
                    age_secs = evicted.stored_at.elapsed().as_secs(),
                    "evicted cache entry"
                );
            }
        }
        if inner.total_bytes + size > self.max_total_size {
            return false;
        }
        let item = CacheItem {
            payload: value,
            size,
            stored_at: Instant::now(),
        };
        match inner.index.insert(key.to_string(), item) {
            Some(previous) => {
                inner.total_bytes -= previous.size;
                inner.history.bubble(key);
            }
            None => {
                inner.history.push_front(key.to_string());
            }
        }
        inner.total_bytes += size;
        true
    }

    /// Snapshot the counters under the lock.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            success_hits: inner.success_hits,
            total_hits: inner.total_hits,
            item_count: inner.index.len(),
            total_bytes: inner.total_bytes,
        }
    }

    pub fn max_item_size(&self) -> usize {
        self.max_item_size
    }

    pub fn max_total_size(&self) -> usize {
        self.max_total_size
    }

    /// Keys in most-recently-used-first order, for tests.
    #[cfg(test)]
    fn keys_mru(&self) -> Vec<String> {
        self.inner.lock().history.iter().cloned().collect()
    }
}
