//! REST API server module
//!
//! Exposes the coordinator's control surface to a browser extension or any
//! other local client: scanning tabs, starting and cancelling sessions,
//! user settings, and a server-sent event stream. Pages use the same server to
//! push their scans and to serve conversion jobs.

use crate::{Config, PageBridge, Result, SessionCoordinator};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Pages
/// - `POST /scan` - Scan a tab for image candidates
/// - `POST /pages/loaded` - Page-load notification (auto-download trigger)
/// - `POST /pages/scan` - A page publishes its scan result
/// - `POST /pages/closed` - A tab closed
/// - `GET /pages/:tab_id/conversions` - Conversion jobs for a tab (SSE)
/// - `GET /conversions/:job_id/source` - Source bytes of a pending job
/// - `POST /conversions/:job_id` - Converted bytes (`?width=&height=`)
/// - `POST /conversions/:job_id/error` - Conversion failure
///
/// ## Sessions
/// - `POST /sessions` - Start a download session
/// - `POST /sessions/cancel` - Cancel the current session
/// - `GET /sessions/current` - Progress snapshot of the current session
///
/// ## Configuration
/// - `GET /config` - Current user settings
/// - `PUT /config` - Replace user settings
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent events stream
pub fn create_router(
    coordinator: Arc<SessionCoordinator>,
    config: Arc<Config>,
    pages: PageBridge,
) -> Router {
    let state = AppState::new(coordinator, config.clone(), pages);

    let router = Router::new()
        // Pages
        .route("/scan", post(routes::scan_tab))
        .route("/pages/loaded", post(routes::page_loaded))
        .route("/pages/scan", post(routes::publish_scan))
        .route("/pages/closed", post(routes::page_closed))
        .route("/pages/:tab_id/conversions", get(routes::conversion_jobs))
        .route("/conversions/:job_id/source", get(routes::conversion_source))
        .route("/conversions/:job_id", post(routes::complete_conversion))
        .route("/conversions/:job_id/error", post(routes::fail_conversion))
        // Sessions
        .route("/sessions", post(routes::start_session))
        .route("/sessions/cancel", post(routes::cancel_session))
        .route("/sessions/current", get(routes::current_session))
        // Configuration
        .route("/config", get(routes::get_config).put(routes::update_config))
        // System
        .route("/health", get(routes::health_check))
        .route("/events", get(routes::event_stream))
        .with_state(state);

    if config.server.api.cors_enabled {
        router.layer(build_cors_layer(&config.server.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. Origins that are not valid header
/// values are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops.
///
/// # Example
///
/// ```no_run
/// use image_batch_dl::{Config, PageBridge, SessionCoordinator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let pages = PageBridge::new();
/// let services = pages.collaborators(&config).await?;
/// let coordinator = Arc::new(SessionCoordinator::new(config.clone(), services));
///
/// image_batch_dl::api::start_api_server(coordinator, Arc::new(config), pages).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    coordinator: Arc<SessionCoordinator>,
    config: Arc<Config>,
    pages: PageBridge,
) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(coordinator, config, pages);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
