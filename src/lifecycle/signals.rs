//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for Ctrl+C (SIGINT)
//! - Translate it into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed handler install is logged, not fatal: the bridge keeps serving

use tokio::task::JoinHandle;

use super::shutdown::Shutdown;

/// Spawn a task that triggers `shutdown` on Ctrl+C.
pub fn spawn_ctrl_c_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    })
}

