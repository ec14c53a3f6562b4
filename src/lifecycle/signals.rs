//! OS signal handling.
//!
//! Ctrl-C (SIGINT) triggers the shared [`CancellationSignal`].

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::CancellationSignal;

/// Cancel `signal` on the first Ctrl-C.
pub fn spawn_ctrl_c_handler(signal: Arc<CancellationSignal>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, cancelling in-flight runs");
                signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    })
}
