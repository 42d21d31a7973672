//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`pages`] - Tab scans, page-load notifications and page-side ingress
//! - [`sessions`] - Session start, cancel and progress
//! - [`config`] - User settings
//! - [`system`] - Health and events

use crate::types::{ImageCandidate, ScanResult, TabId};
use serde::{Deserialize, Serialize};

mod config;
mod pages;
mod sessions;
mod system;

pub use config::*;
pub use pages::*;
pub use sessions::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /scan
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Tab to scan
    pub tab_id: TabId,
}

/// Request body for POST /sessions
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    /// Tab the session was started from
    pub tab_id: TabId,
    /// Caller-chosen session identity
    pub session_id: String,
    /// The scan the selection was made from
    pub scan: ScanResult,
    /// Candidates to download, in order
    #[serde(default)]
    pub selected: Vec<ImageCandidate>,
}

/// Request body for POST /pages/loaded
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadedRequest {
    /// Tab that finished loading
    pub tab_id: TabId,
    /// URL now shown in the tab
    #[serde(default)]
    pub url: String,
}

/// Request body for POST /pages/scan
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishScanRequest {
    /// Tab the scan was taken in
    pub tab_id: TabId,
    /// Everything the page found
    pub scan: ScanResult,
}

/// Query of POST /conversions/:job_id
#[derive(Debug, Deserialize, Serialize)]
pub struct ConvertedQuery {
    /// Pixel width of the decoded image
    pub width: u32,
    /// Pixel height of the decoded image
    pub height: u32,
}

/// Request body for POST /conversions/:job_id/error
#[derive(Debug, Deserialize, Serialize)]
pub struct ConversionFailure {
    /// Failure reported by the page; empty means unspecified
    #[serde(default)]
    pub message: String,
}

/// Acknowledgement envelope, `{"ok": true}` with an optional payload
#[derive(Debug, Deserialize, Serialize)]
pub struct Ack<T = ()> {
    /// Always `true` on success
    pub ok: bool,
    /// Payload, omitted when there is none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Ack {
    /// Bare acknowledgement
    pub fn ok() -> Self {
        Self {
            ok: true,
            data: None,
        }
    }
}

impl<T> Ack<T> {
    /// Acknowledgement carrying `data`
    pub fn with_data(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
        }
    }
}
