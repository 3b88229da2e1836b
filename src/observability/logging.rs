//! Structured logging.
//!
//! # Responsibilities
//! - Document how the logging subsystem is wired
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging; the subscriber is
//!   installed once in main.rs
//! - Verbosity is configuration, not process-global mutable state: the CLI
//!   `verbose` flag picks the default filter level, RUST_LOG overrides it
//! - Info and debug go to stdout, errors carry structured fields for the
//!   failing connection
