//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl-C / SIGINT into the internal shutdown signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The signal task only triggers the coordinator; the dispatcher owns
//!   the actual teardown ordering

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Spawn a task that triggers shutdown on the first Ctrl-C.
pub fn spawn_ctrl_c_trigger(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received");
                shutdown.trigger();
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install Ctrl-C handler");
            }
        }
    });
}
