//! User settings handlers.

use crate::api::AppState;
use crate::config::DownloadConfig;
use crate::error::Result;
use axum::{Json, extract::State};

/// GET /config - Current user settings
pub async fn get_config(State(state): State<AppState>) -> Json<DownloadConfig> {
    Json(state.coordinator.get_settings().await)
}

/// PUT /config - Replace user settings
///
/// Missing fields take their defaults; out-of-range values are clamped. The
/// stored settings are returned.
pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<DownloadConfig>,
) -> Result<Json<DownloadConfig>> {
    let stored = state.coordinator.update_settings(config).await?;
    Ok(Json(stored))
}
