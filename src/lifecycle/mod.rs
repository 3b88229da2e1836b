//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse CLI → Load config → Validate → Bind listener → Run dispatcher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Handlers drop sockets → Pool drains
//!
//! Signals (signals.rs):
//!     SIGINT / Ctrl-C → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting first, then drain, then join
//! - The shutdown signal is broadcast; nothing polls a flag

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
