//! Session handlers.

use super::{Ack, StartSessionRequest};
use crate::api::AppState;
use crate::coordinator::SessionSnapshot;
use crate::error::Result;
use crate::types::SessionId;
use axum::{Json, extract::State};

/// POST /sessions - Start a download session
///
/// Any current session is cancelled first. Returns as soon as the session is
/// installed; progress arrives on `/events`.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<Ack>> {
    state
        .coordinator
        .start_session(
            request.tab_id,
            SessionId::new(request.session_id),
            request.scan,
            request.selected,
        )
        .await?;

    Ok(Json(Ack::ok()))
}

/// POST /sessions/cancel - Cancel the current session (no-op without one)
pub async fn cancel_session(State(state): State<AppState>) -> Json<Ack> {
    state.coordinator.cancel_current().await;
    Json(Ack::ok())
}

/// GET /sessions/current - Progress snapshot of the current session
pub async fn current_session(State(state): State<AppState>) -> Result<Json<SessionSnapshot>> {
    let snapshot = state.coordinator.current_snapshot().await?;
    Ok(Json(snapshot))
}
