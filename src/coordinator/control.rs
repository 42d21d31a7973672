//! Control operations: scan, cancel, settings and shutdown.

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::types::{Event, ScanResult, TabId};
use crate::utils::badge_text;
use std::sync::Arc;
use std::time::Duration;

use super::SessionCoordinator;
use super::session::{SessionHandle, SessionSnapshot};

/// How long shutdown waits for in-flight tasks of the current session
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

impl SessionCoordinator {
    /// Scan the page shown in `tab`
    ///
    /// Honors the user's `include_background_images` setting and emits
    /// [`Event::ScanCompleted`] with the badge text for the tab.
    ///
    /// # Errors
    ///
    /// Propagates the scan provider's error unchanged.
    pub async fn scan(&self, tab: TabId) -> Result<ScanResult> {
        let config = self.services.settings.get().await;
        let result = self
            .services
            .scanner
            .scan(tab, config.include_background_images)
            .await?;

        let count = result.images.len();
        tracing::info!(tab_id = %tab, count, page_url = %result.page_url, "Page scanned");
        self.emit_event(Event::ScanCompleted {
            tab_id: tab,
            count,
            badge: badge_text(count),
        });

        Ok(result)
    }

    /// Cancel the current session
    ///
    /// Tasks already in flight run to completion and are still reported; no
    /// further task is admitted and no manifest is written. Returns `false`
    /// when there is no current session or it was already cancelled.
    pub async fn cancel_current(&self) -> bool {
        let current = self.current.lock().await.clone();
        let Some(handle) = current else {
            return false;
        };

        if !handle.cancel() {
            return false;
        }

        tracing::info!(session_id = %handle.id, "Download session cancelled");
        self.emit_event(Event::SessionCancelled {
            session_id: handle.id.clone(),
            superseded: false,
        });
        true
    }

    /// The current session, if any
    pub async fn current_session(&self) -> Option<Arc<SessionHandle>> {
        self.current.lock().await.clone()
    }

    /// Snapshot of the current session
    ///
    /// # Errors
    ///
    /// [`Error::NoSession`] when no session has been started.
    pub async fn current_snapshot(&self) -> Result<SessionSnapshot> {
        match self.current_session().await {
            Some(handle) => Ok(handle.snapshot().await),
            None => Err(Error::NoSession),
        }
    }

    /// Current user settings
    pub async fn get_settings(&self) -> DownloadConfig {
        self.services.settings.get().await
    }

    /// Replace the user settings
    ///
    /// Takes effect for sessions started afterwards; running sessions keep the
    /// settings they were started with.
    pub async fn update_settings(&self, config: DownloadConfig) -> Result<DownloadConfig> {
        self.services.settings.set(config).await?;
        self.emit_event(Event::SettingsChanged);
        Ok(self.services.settings.get().await)
    }

    /// Gracefully shut down
    ///
    /// Cancels the current session and waits (bounded) for its in-flight tasks
    /// to settle.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.cancel_current().await;

        if let Some(handle) = self.current_session().await {
            match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, handle.wait_finished()).await {
                Ok(()) => tracing::info!("In-flight downloads settled"),
                Err(_) => tracing::warn!(
                    session_id = %handle.id,
                    "Timeout waiting for in-flight downloads, proceeding with shutdown"
                ),
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
