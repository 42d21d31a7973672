//! Session coordinator split into focused submodules.
//!
//! The `SessionCoordinator` struct and its methods are organized by domain:
//! - [`session`] - Per-session state, counters and snapshots
//! - [`start`] - Session start and supersession
//! - [`worker_loop`] - Admission loop bounded by `max_concurrency`
//! - [`task`] - Fetch, convert, stage and write of a single candidate
//! - [`finalize`] - Manifest write once a session drains
//! - [`control`] - Scan, cancel, settings and shutdown
//! - [`auto`] - Auto-download when a page finishes loading

mod auto;
mod control;
mod finalize;
pub(crate) mod session;
mod start;
mod task;
mod worker_loop;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use session::{SessionHandle, SessionSnapshot};

use crate::bridge::PageBridge;
use crate::config::Config;
use crate::converter::FormatConverter;
use crate::db::Database;
use crate::error::Result;
use crate::fetcher::{HttpFetcher, ResourceFetcher};
use crate::scan::ScanProvider;
use crate::settings::{DbSettingsStore, SettingsStore};
use crate::storage::{FsStorageSink, StagingArea, StorageSink};
use crate::types::{Event, Progress, SessionId, TabId};
use std::collections::HashMap;
use std::sync::Arc;

/// External capabilities the coordinator drives
///
/// Every collaborator is a trait object so deployments and tests can swap
/// implementations freely.
#[derive(Clone)]
pub struct Collaborators {
    /// Retrieves image bytes
    pub fetcher: Arc<dyn ResourceFetcher>,
    /// Re-encodes images inside the originating tab
    pub converter: Arc<dyn FormatConverter>,
    /// Persists finished files
    pub storage: Arc<dyn StorageSink>,
    /// Lists the candidates of a tab
    pub scanner: Arc<dyn ScanProvider>,
    /// User settings
    pub settings: Arc<dyn SettingsStore>,
}

impl Collaborators {
    /// Standard wiring: HTTP fetcher, filesystem sink under the download
    /// directory, and SQLite-backed settings.
    ///
    /// The scan provider and converter depend on how pages are attached, so
    /// the caller supplies them.
    pub async fn open(
        config: &Config,
        scanner: Arc<dyn ScanProvider>,
        converter: Arc<dyn FormatConverter>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| {
                crate::Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir().display(),
                        e
                    ),
                ))
            })?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        tracing::info!(
            converter = converter.name(),
            download_dir = %config.download_dir().display(),
            "Collaborators initialized"
        );

        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new(&config.network)?),
            converter,
            storage: Arc::new(FsStorageSink::new(config.download_dir().clone())),
            scanner,
            settings: Arc::new(DbSettingsStore::new(db)),
        })
    }
}

/// Main coordinator instance (cloneable - all fields are Arc-wrapped)
///
/// Owns at most one current download session. Starting a new session cancels
/// the previous one without waiting for it to drain.
#[derive(Clone)]
pub struct SessionCoordinator {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Service configuration
    pub(crate) config: Arc<Config>,
    /// External capabilities
    pub(crate) services: Collaborators,
    /// Transient blobs awaiting release
    pub(crate) staging: StagingArea,
    /// The current session, if any
    pub(crate) current: Arc<tokio::sync::Mutex<Option<Arc<SessionHandle>>>>,
    /// Last URL auto-downloaded per tab
    pub(crate) auto_downloaded: Arc<tokio::sync::Mutex<HashMap<TabId, String>>>,
}

impl SessionCoordinator {
    /// Create a coordinator over the given collaborators
    pub fn new(config: Config, services: Collaborators) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.event_buffer.max(1));

        Self {
            event_tx,
            config: Arc::new(config),
            services,
            staging: StagingArea::new(),
            current: Arc::new(tokio::sync::Mutex::new(None)),
            auto_downloaded: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to session events
    ///
    /// Each subscriber receives all events emitted after it subscribed; there
    /// is no replay. A subscriber that falls behind by more than
    /// `event_buffer` events receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the service configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Staging area shared by all sessions
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Publish a progress snapshot for a session (best effort, no replay)
    pub(crate) fn report_progress(
        &self,
        session_id: &SessionId,
        total: usize,
        done: usize,
        failed: usize,
    ) {
        self.emit_event(Event::Progress(Progress {
            session_id: session_id.clone(),
            total,
            done,
            failed,
        }));
    }

    /// Spawn the REST API server in a background task
    ///
    /// `pages` must be the bridge the scan provider and converter came from,
    /// otherwise page pushes never reach this coordinator.
    pub fn spawn_api_server(&self, pages: PageBridge) -> tokio::task::JoinHandle<Result<()>> {
        let coordinator = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(coordinator, config, pages).await })
    }
}
