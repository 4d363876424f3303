//! Client side of the control socket, used by `nqkctl`.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;

use crate::control::handlers::Accepted;
use crate::control::{ControlError, APPLY_PATH, STATUS_PATH};
use crate::state::StatusEntry;

/// Responses above this size are refused.
const RESPONSE_LIMIT: usize = 16 * 1024 * 1024;

pub struct ControlClient {
    socket: PathBuf,
}

impl ControlClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Ask the daemon to queue an apply pass.
    pub async fn force_apply(&self) -> Result<bool, ControlError> {
        let accepted: Accepted = self.call(Method::POST, APPLY_PATH, StatusCode::ACCEPTED).await?;
        Ok(accepted.accepted)
    }

    pub async fn status(&self) -> Result<Vec<StatusEntry>, ControlError> {
        self.call(Method::GET, STATUS_PATH, StatusCode::OK).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        expected: StatusCode,
    ) -> Result<T, ControlError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| ControlError::Connect {
                path: self.socket.clone(),
                source,
            })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Control connection closed with error");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost")
            .body(Body::empty())?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), RESPONSE_LIMIT).await?;

        if status != expected {
            return Err(ControlError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
