use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::control::ControlState;
use crate::scheduler::PassKind;
use crate::state::StatusEntry;

#[derive(Debug, Serialize, Deserialize)]
pub struct Accepted {
    pub accepted: bool,
}

/// Queue an apply pass. Accepted means queued, not completed.
pub async fn force_apply(State(state): State<ControlState>) -> (StatusCode, Json<Accepted>) {
    let queued = state.queue.trigger(PassKind::Apply);
    tracing::info!(queued, "Apply requested over the control socket");
    (StatusCode::ACCEPTED, Json(Accepted { accepted: true }))
}

/// Snapshot of every tracked unit, ordered by name.
pub async fn get_status(State(state): State<ControlState>) -> Json<Vec<StatusEntry>> {
    let snapshot = state.status.snapshot();
    Json(snapshot.as_ref().clone())
}
