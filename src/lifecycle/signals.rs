//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and SIGTERM both mean graceful shutdown.

use tokio::signal::unix::{signal, SignalKind};

/// Wait for the first termination signal and return its name.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
