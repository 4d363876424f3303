//! Control plane: local HTTP over a Unix socket.
//!
//! # Endpoints
//! - `POST /v1/apply`  → 202 `{"accepted":true}`, queues an apply pass
//! - `GET  /v1/status` → 200, JSON array of unit status entries
//!
//! # Design Decisions
//! - The socket is world-writable; access control is the host itself
//! - Status reads a published snapshot and never blocks the executor

pub mod client;
pub mod handlers;
pub mod server;

use std::path::PathBuf;

use axum::{
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub use client::ControlClient;
pub use server::{resolve_socket_path, ControlServer};

use crate::scheduler::PassQueue;
use crate::state::StatusReader;
use self::handlers::{force_apply, get_status};

pub const APPLY_PATH: &str = "/v1/apply";
pub const STATUS_PATH: &str = "/v1/status";

/// Socket file name used when none is configured.
pub const SOCKET_FILE: &str = "nqkd.sock";

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to bind control socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("control server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to connect to the daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("control request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build control request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("failed to read control response: {0}")]
    Body(#[from] axum::Error),

    #[error("daemon answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode control response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Shared handler state.
#[derive(Clone)]
pub struct ControlState {
    pub queue: PassQueue,
    pub status: StatusReader,
}

pub fn control_router(state: ControlState) -> Router {
    Router::new()
        .route(APPLY_PATH, post(force_apply))
        .route(STATUS_PATH, get(get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PassKind;
    use crate::state::StateTracker;
    use crate::units::Unit;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> (Router, PassQueue, StateTracker) {
        let queue = PassQueue::new();
        let tracker = StateTracker::new();
        let state = ControlState {
            queue: queue.clone(),
            status: tracker.reader(),
        };
        (control_router(state), queue, tracker)
    }

    #[tokio::test]
    async fn test_force_apply_queues_and_returns_accepted() {
        let (router, queue, _tracker) = router();
        let response = router
            .oneshot(Request::post(APPLY_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"accepted":true}"#);
        assert!(queue.is_pending(PassKind::Apply));
    }

    #[tokio::test]
    async fn test_status_returns_snapshot() {
        let (router, _queue, mut tracker) = router();
        tracker.record_seen(Unit {
            name: "web".into(),
            source: "/srv/web.yaml".into(),
            content: String::new(),
        });

        let response = router
            .oneshot(Request::get(STATUS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json[0]["name"], "web");
        assert_eq!(json[0]["state"], "Seen");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (router, _queue, _tracker) = router();
        let response = router
            .oneshot(Request::get("/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
