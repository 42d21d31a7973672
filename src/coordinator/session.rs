//! Per-session state.
//!
//! Counters only move under the session mutex, at admission and at
//! settlement. The lock is never held across an await on I/O.

use crate::config::DownloadConfig;
use crate::types::{DownloadItem, ImageCandidate, Progress, SessionId, TabId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

/// A candidate waiting for admission, numbered from 1 in selection order
#[derive(Debug, Clone)]
pub(crate) struct QueuedTask {
    pub(crate) index: usize,
    pub(crate) candidate: ImageCandidate,
}

/// Mutable part of a session
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Tasks not yet admitted, FIFO
    pub(crate) queue: VecDeque<QueuedTask>,
    /// Tasks admitted and not yet settled
    pub(crate) active: usize,
    /// Tasks written successfully
    pub(crate) done: usize,
    /// Tasks that failed
    pub(crate) failed: usize,
    /// Terminal records in settlement order
    pub(crate) results: Vec<DownloadItem>,
    /// Set once the manifest step has been entered
    pub(crate) finalized: bool,
}

/// One download session
///
/// Immutable identity plus the mutable [`SessionState`]. Shared between the
/// coordinator (as the current session) and the session's admission loop.
#[derive(Debug)]
pub struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) tab: TabId,
    pub(crate) page_title: String,
    pub(crate) page_url: String,
    pub(crate) folder: String,
    pub(crate) config: DownloadConfig,
    pub(crate) total: usize,
    /// One-way cancellation flag
    pub(crate) cancel: CancellationToken,
    /// Fires when the admission loop has exited
    pub(crate) finished: CancellationToken,
    pub(crate) state: tokio::sync::Mutex<SessionState>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session ID
    pub session_id: SessionId,
    /// Originating tab
    pub tab_id: TabId,
    /// Destination folder
    pub folder: String,
    /// Number of tasks at start
    pub total: usize,
    /// Tasks written successfully
    pub done: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks in flight
    pub active: usize,
    /// Tasks waiting for admission
    pub queued: usize,
    /// Whether the session was cancelled
    pub cancelled: bool,
    /// Whether the admission loop has exited
    pub finished: bool,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        tab: TabId,
        page_title: String,
        page_url: String,
        folder: String,
        config: DownloadConfig,
        selected: Vec<ImageCandidate>,
    ) -> Self {
        let queue: VecDeque<QueuedTask> = selected
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| QueuedTask {
                index: i + 1,
                candidate,
            })
            .collect();

        Self {
            id,
            tab,
            page_title,
            page_url,
            folder,
            config,
            total: queue.len(),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            state: tokio::sync::Mutex::new(SessionState {
                queue,
                ..SessionState::default()
            }),
        }
    }

    /// Session ID
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Originating tab
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Sanitized destination folder
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Settings captured at session start
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Number of tasks at start
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether the session has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Flip the cancellation flag. Returns `false` if it was already set.
    pub(crate) fn cancel(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Wait until the admission loop has exited.
    ///
    /// In-flight tasks have settled by then; the manifest step, if any, has
    /// completed.
    pub async fn wait_finished(&self) {
        self.finished.cancelled().await;
    }

    /// Aggregate counters
    pub async fn progress(&self) -> Progress {
        let state = self.state.lock().await;
        self.progress_of(&state)
    }

    pub(crate) fn progress_of(&self, state: &SessionState) -> Progress {
        Progress {
            session_id: self.id.clone(),
            total: self.total,
            done: state.done,
            failed: state.failed,
        }
    }

    /// Full snapshot including in-flight and queued counts
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            tab_id: self.tab,
            folder: self.folder.clone(),
            total: self.total,
            done: state.done,
            failed: state.failed,
            active: state.active,
            queued: state.queue.len(),
            cancelled: self.is_cancelled(),
            finished: self.finished.is_cancelled(),
        }
    }

    /// Terminal records so far, in settlement order
    pub async fn results(&self) -> Vec<DownloadItem> {
        self.state.lock().await.results.clone()
    }
}
