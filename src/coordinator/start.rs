//! Session start and supersession.

use crate::error::{Error, Result};
use crate::types::{Event, ImageCandidate, ScanResult, SessionId, TabId};
use crate::utils::sanitize_folder_name;
use std::sync::Arc;

use super::SessionCoordinator;
use super::session::SessionHandle;

impl SessionCoordinator {
    /// Start a download session over `selected`
    ///
    /// Reads the user settings once (they are fixed for the session's
    /// lifetime), derives the destination folder from the page title, cancels
    /// the current session if there is one, and installs the new session
    /// before any of its tasks run. Returns once the session is installed;
    /// downloads proceed in the background.
    ///
    /// The superseded session is not drained: its in-flight tasks still settle
    /// against its own state, but it admits nothing new and never writes a
    /// manifest.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] when `session_id` is empty.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use image_batch_dl::*;
    /// # async fn example(coordinator: SessionCoordinator, scan: ScanResult) -> Result<()> {
    /// let selected = scan.images.clone();
    /// let session = coordinator
    ///     .start_session(TabId(1), SessionId::new("s-1"), scan, selected)
    ///     .await?;
    /// session.wait_finished().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_session(
        &self,
        tab: TabId,
        session_id: SessionId,
        scan: ScanResult,
        selected: Vec<ImageCandidate>,
    ) -> Result<Arc<SessionHandle>> {
        if session_id.as_str().trim().is_empty() {
            return Err(Error::InvalidRequest("session id must not be empty".into()));
        }

        let config = self.services.settings.get().await.normalized();
        let folder = sanitize_folder_name(&scan.page_title);

        let handle = Arc::new(SessionHandle::new(
            session_id,
            tab,
            scan.page_title,
            scan.page_url,
            folder,
            config,
            selected,
        ));

        let superseded = {
            let mut current = self.current.lock().await;
            // Only report sessions that were still running
            let previous = match current.take() {
                Some(previous) if previous.cancel() => Some(previous),
                _ => None,
            };
            *current = Some(Arc::clone(&handle));
            previous
        };

        if let Some(previous) = superseded {
            tracing::info!(
                session_id = %previous.id,
                superseded_by = %handle.id,
                "Session superseded"
            );
            self.emit_event(Event::SessionCancelled {
                session_id: previous.id.clone(),
                superseded: true,
            });
        }

        tracing::info!(
            session_id = %handle.id,
            tab_id = %tab,
            folder = %handle.folder,
            total = handle.total,
            max_concurrency = handle.config.max_concurrency,
            format = ?handle.config.default_format,
            "Download session started"
        );

        self.emit_event(Event::SessionStarted {
            session_id: handle.id.clone(),
            tab_id: tab,
            folder: handle.folder.clone(),
            total: handle.total,
        });
        self.report_progress(&handle.id, handle.total, 0, 0);

        self.spawn_worker_loop(Arc::clone(&handle));

        Ok(handle)
    }
}
