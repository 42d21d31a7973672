//! Core types for image-batch-dl
//!
//! Wire-facing records (`ImageCandidate`, `ScanResult`, `DownloadItem`,
//! `DownloadMetadata`, `Progress`) serialize with camelCase keys so they match
//! the payloads exchanged with the page scanner and the manifest format.

use serde::{Deserialize, Serialize};

use crate::utils::guess_format;

/// Identifier of a download session, chosen by the caller
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the originating browser tab (page context)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where on the page a candidate was discovered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Direct `<img>` element
    Img,
    /// Responsive `<picture><source>` entry
    Source,
    /// Lazy-loaded image (data-src and friends)
    Lazy,
    /// CSS background image
    Background,
    /// Anything else
    #[default]
    Unknown,
}

/// A downloadable image discovered on a page
///
/// Produced by the scan provider and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCandidate {
    /// Deterministic identity: `<best_url>|<width>x<height>`
    pub id: String,
    /// URL the page referenced directly
    pub original_url: String,
    /// Highest-resolution URL among the alternatives
    pub best_url: String,
    /// Natural width, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Natural height, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Lowercase extension-derived format (`jpeg` normalized to `jpg`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// How the candidate was found
    #[serde(default)]
    pub source_type: SourceType,
    /// Raw responsive descriptor string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
}

impl ImageCandidate {
    /// Build a candidate, deriving `id` and `format` from the best URL.
    pub fn new(
        original_url: impl Into<String>,
        best_url: impl Into<String>,
        width: Option<u32>,
        height: Option<u32>,
        source_type: SourceType,
    ) -> Self {
        let best_url = best_url.into();
        Self {
            id: candidate_id(&best_url, width, height),
            original_url: original_url.into(),
            format: guess_format(&best_url),
            best_url,
            width,
            height,
            source_type,
            srcset: None,
        }
    }

    /// Attach the raw responsive descriptor string
    pub fn with_srcset(mut self, srcset: impl Into<String>) -> Self {
        self.srcset = Some(srcset.into());
        self
    }
}

/// Compute the deduplication identity of a candidate.
pub fn candidate_id(url: &str, width: Option<u32>, height: Option<u32>) -> String {
    format!("{}|{}x{}", url, width.unwrap_or(0), height.unwrap_or(0))
}

/// Output of a page scan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Document title
    pub page_title: String,
    /// Document URL
    pub page_url: String,
    /// Candidates in page order
    pub images: Vec<ImageCandidate>,
}

/// Status of a download item
///
/// `Queued` and `Downloading` exist for consumers that render live item lists;
/// records persisted in the manifest are always `Done` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for admission
    Queued,
    /// Admitted and in flight
    Downloading,
    /// Written to storage
    Done,
    /// Failed at some step
    Failed,
}

/// Terminal record for one task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadItem {
    /// Candidate identity
    pub id: String,
    /// Resolved output filename
    pub filename: String,
    /// Destination folder
    pub folder: String,
    /// URL the bytes were fetched from
    pub download_url: String,
    /// URL the page referenced
    pub original_url: String,
    /// Resulting width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Resulting height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Resulting format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Terminal status
    pub status: ItemStatus,
    /// Byte size on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Session manifest written as `metadata.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadMetadata {
    /// Originating page title
    pub page_title: String,
    /// Originating page URL
    pub page_url: String,
    /// ISO-8601 completion timestamp
    pub timestamp: String,
    /// Items in settlement order
    pub items: Vec<DownloadItem>,
}

/// Aggregate counters of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Session the counters belong to
    pub session_id: SessionId,
    /// Number of tasks at session start
    pub total: usize,
    /// Tasks written successfully
    pub done: usize,
    /// Tasks that failed
    pub failed: usize,
}

/// Event emitted during a session's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    /// A new session was installed as current
    SessionStarted {
        /// Session ID
        session_id: SessionId,
        /// Originating tab
        tab_id: TabId,
        /// Sanitized destination folder
        folder: String,
        /// Number of tasks
        total: usize,
    },

    /// Aggregate counters changed
    Progress(Progress),

    /// One task settled
    ItemSettled {
        /// Session ID
        session_id: SessionId,
        /// 1-based task index
        index: usize,
        /// The terminal record
        item: DownloadItem,
    },

    /// A session was cancelled (explicitly or by supersession)
    SessionCancelled {
        /// Session ID
        session_id: SessionId,
        /// Whether a newer session replaced it
        superseded: bool,
    },

    /// The manifest was written and the session ended
    SessionFinalized {
        /// Session ID
        session_id: SessionId,
        /// Relative manifest path
        manifest_path: String,
        /// Items written successfully
        done: usize,
        /// Items that failed
        failed: usize,
    },

    /// The manifest could not be written
    ManifestFailed {
        /// Session ID
        session_id: SessionId,
        /// Error message
        error: String,
    },

    /// A page scan completed
    ScanCompleted {
        /// Scanned tab
        tab_id: TabId,
        /// Number of candidates found
        count: usize,
        /// Badge text for the tab (`""` when nothing was found)
        badge: String,
    },

    /// User settings changed
    SettingsChanged,

    /// The coordinator is shutting down
    Shutdown,
}
