//! Application state for the API server

use crate::{Config, PageBridge, SessionCoordinator};
use std::sync::Arc;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    /// The coordinator driving sessions
    pub coordinator: Arc<SessionCoordinator>,

    /// Service configuration (read-only; user settings go through the coordinator)
    pub config: Arc<Config>,

    /// Ingress for page-pushed scans and conversion replies
    pub pages: PageBridge,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        config: Arc<Config>,
        pages: PageBridge,
    ) -> Self {
        Self {
            coordinator,
            config,
            pages,
        }
    }
}
