//! Caching Forward HTTP Proxy Library
//!
//! A concurrent forward proxy with an in-memory LRU response cache. One
//! dispatcher task accepts clients; a fixed worker pool runs one handler
//! per connection; handlers consult the cache before relaying bytes
//! between client and origin.
//!
//! ```text
//!                  ┌───────────────────────────────────────────────┐
//!                  │                 CACHING PROXY                  │
//!   Client ────────┼─▶ proxy::server (accept loop) ─▶ pool (workers)│
//!                  │                                      │         │
//!                  │                                      ▼         │
//!                  │       proxy::handler ◀──▶ cache::lru (LRU)     │
//!                  │            │                                   │
//!   Origin ◀───────┼────────────┘  full-duplex relay                │
//!                  └───────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod config;
pub mod pool;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use cache::{CacheStats, LruCache};
pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use pool::WorkerPool;
pub use proxy::ProxyServer;
