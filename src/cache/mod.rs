//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! handler looks up URL
//!     → lru.rs (mutex-guarded index + byte accounting)
//!     → deque.rs (recency order, O(1) promotion/demotion)
//!
//! handler captures origin response
//!     → lru.rs put (evicts from the LRU end until the bytes fit)
//! ```
//!
//! # Design Decisions
//! - The deque is single-threaded on purpose; the cache mutex is the only
//!   synchronization point
//! - Eviction order is exactly recency order; there is no TTL
//! - The cache never touches sockets, so holding its lock is always brief

pub mod deque;
pub mod lru;

pub use deque::IndexedDeque;
pub use lru::{CacheLimitsError, CacheStats, LruCache};
