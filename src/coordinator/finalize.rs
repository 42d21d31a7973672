//! Session finalization: writes `metadata.json` once a session drains.

use crate::error::WriteError;
use crate::storage::ConflictPolicy;
use crate::types::{DownloadMetadata, Event};
use bytes::Bytes;
use chrono::SecondsFormat;

use super::SessionCoordinator;
use super::session::SessionHandle;
use super::task::bounded;

/// Manifest filename inside the session folder
pub const MANIFEST_FILENAME: &str = "metadata.json";

impl SessionCoordinator {
    /// Write the session manifest
    ///
    /// Runs at most once per session. Failures are logged and reported as
    /// [`Event::ManifestFailed`]; they never surface to the caller.
    pub(crate) async fn finalize_session(&self, handle: &SessionHandle) {
        let (items, done, failed) = {
            let mut state = handle.state.lock().await;
            if state.finalized || !state.queue.is_empty() || state.active > 0 {
                return;
            }
            state.finalized = true;
            (state.results.clone(), state.done, state.failed)
        };

        let metadata = DownloadMetadata {
            page_title: handle.page_title.clone(),
            page_url: handle.page_url.clone(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            items,
        };

        let json = match serde_json::to_vec_pretty(&metadata) {
            Ok(json) => json,
            Err(e) => {
                self.manifest_failed(handle, &e.to_string());
                return;
            }
        };

        // Last gate: a cancellation that raced the drain still suppresses the write
        if handle.is_cancelled() {
            tracing::info!(session_id = %handle.id, "Session cancelled before manifest write");
            return;
        }

        let path = format!("{}/{}", handle.folder, MANIFEST_FILENAME);
        let blob = self
            .staging
            .stage(Bytes::from(json), "application/json")
            .await;
        let written = bounded(
            self.config.network.write_timeout,
            self.services
                .storage
                .write(&blob, &path, ConflictPolicy::Overwrite),
            WriteError::Timeout,
        )
        .await;
        self.staging
            .schedule_release(&blob, self.config.storage.blob_release_delay);

        match written {
            Ok(stored) if stored.id.is_some() => {
                tracing::info!(
                    session_id = %handle.id,
                    manifest = %path,
                    done,
                    failed,
                    "Download session finalized"
                );
                self.emit_event(Event::SessionFinalized {
                    session_id: handle.id.clone(),
                    manifest_path: path,
                    done,
                    failed,
                });
            }
            Ok(_) => {
                let error = WriteError::NoIdentifier { path };
                self.manifest_failed(handle, &error.to_string());
            }
            Err(e) => self.manifest_failed(handle, &e.to_string()),
        }
    }

    fn manifest_failed(&self, handle: &SessionHandle, error: &str) {
        let error = if error.is_empty() {
            "failed to save metadata"
        } else {
            error
        };
        tracing::error!(session_id = %handle.id, error, "Failed to write session manifest");
        self.emit_event(Event::ManifestFailed {
            session_id: handle.id.clone(),
            error: error.to_string(),
        });
    }
}
