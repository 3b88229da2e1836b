//! Proxy engine subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → server.rs (accept loop, live-clients registry)
//!     → worker pool (one handler job per connection)
//!     → request.rs (fingerprint from the request line)
//!     → cache lookup, or origin connect + full-duplex relay
//!     → handler.rs (response capture, cache insert)
//! ```
//!

pub mod handler;
pub mod request;
pub mod server;

pub use handler::HandlerError;
pub use request::{RequestLine, DYNAMIC_PATH_MARKERS};
pub use server::{ProxyServer, ServerError};
