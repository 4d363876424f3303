//! Control socket server.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tokio::sync::broadcast;

use crate::control::{control_router, ControlError, ControlState, SOCKET_FILE};

/// Socket file mode; any local user may talk to the daemon.
pub const SOCKET_MODE: u32 = 0o777;

/// Configured path, else `$RUNTIME_DIRECTORY/nqkd.sock`, else `nqkd.sock`
/// in the working directory.
pub fn resolve_socket_path(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    match std::env::var_os("RUNTIME_DIRECTORY") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(SOCKET_FILE),
        _ => PathBuf::from(SOCKET_FILE),
    }
}

/// A bound control socket, ready to serve.
pub struct ControlServer {
    path: PathBuf,
    listener: UnixListener,
}

impl ControlServer {
    /// Remove any stale socket at `path`, bind, and open up permissions.
    pub fn bind(path: &Path) -> Result<Self, ControlError> {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale control socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ControlError::Bind {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let listener = UnixListener::bind(path).map_err(|source| ControlError::Bind {
            path: path.to_path_buf(),
            source,
        })?;

        fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE)).map_err(|source| {
            ControlError::Permissions {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::info!(socket = %path.display(), "Control socket bound");
        Ok(Self {
            path: path.to_path_buf(),
            listener,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the listener and remove the socket file without serving.
    pub fn discard(self) {
        drop(self.listener);
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(socket = %self.path.display(), error = %e, "Failed to remove control socket");
        }
    }

    /// Serve until shutdown is signalled.
    pub async fn run(self, state: ControlState, mut shutdown: broadcast::Receiver<()>) -> Result<(), ControlError> {
        let app = control_router(state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(ControlError::Serve)?;

        let _ = fs::remove_file(&self.path);
        tracing::info!("Control server stopped");
        Ok(())
    }
}
