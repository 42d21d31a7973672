//! Auto-download when a page finishes loading.

use crate::error::Result;
use crate::types::{SessionId, TabId};
use std::sync::Arc;

use super::SessionCoordinator;
use super::session::SessionHandle;

impl SessionCoordinator {
    /// Handle a page-load notification for `tab`
    ///
    /// With `auto_download` enabled, scans the tab and starts a session over
    /// every candidate found, unless this tab was already auto-downloaded at
    /// the same URL. The URL is remembered before scanning, so a failed scan is
    /// not retried for the same URL.
    ///
    /// Returns the started session, or `None` when nothing was started.
    ///
    /// # Errors
    ///
    /// Scan failures are returned; callers on the notification path typically
    /// log and discard them.
    pub async fn page_loaded(&self, tab: TabId, url: &str) -> Result<Option<Arc<SessionHandle>>> {
        if url.is_empty() {
            return Ok(None);
        }

        let config = self.services.settings.get().await;
        if !config.auto_download {
            return Ok(None);
        }

        {
            let mut seen = self.auto_downloaded.lock().await;
            if seen.get(&tab).is_some_and(|last| last == url) {
                tracing::debug!(tab_id = %tab, url, "Page already auto-downloaded");
                return Ok(None);
            }
            seen.insert(tab, url.to_string());
        }

        let scan = self.scan(tab).await?;
        let session_id = SessionId::new(format!(
            "auto-{}-{}",
            tab,
            chrono::Utc::now().timestamp_millis()
        ));
        let selected = scan.images.clone();

        tracing::info!(tab_id = %tab, url, session_id = %session_id, "Auto-download triggered");
        let handle = self.start_session(tab, session_id, scan, selected).await?;
        Ok(Some(handle))
    }

    /// Forget the auto-download memory of a closed tab
    pub async fn forget_tab(&self, tab: TabId) {
        self.auto_downloaded.lock().await.remove(&tab);
    }
}
