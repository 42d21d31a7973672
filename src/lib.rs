//! # image-batch-dl
//!
//! Batch image download coordinator for pages scanned in a browser.
//!
//! A client scans a tab, picks a subset of the image candidates found, and
//! starts a download session. The coordinator fetches every selection with
//! bounded concurrency, optionally re-encodes it inside the originating tab,
//! writes it under a folder named after the page, and finishes with a
//! `metadata.json` manifest describing each item.
//!
//! ## Design
//!
//! - **At most one session** - starting a session cancels the previous one
//!   without waiting for it to drain
//! - **Pluggable collaborators** - fetching, conversion, storage, scanning and
//!   settings are traits, so embedders and tests swap them freely
//! - **Event-driven** - consumers subscribe to progress instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_batch_dl::{Config, PageBridge, SessionCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     // Pages push scans and serve conversions through the REST API
//!     let pages = PageBridge::new();
//!     let services = pages.collaborators(&config).await?;
//!     let coordinator = SessionCoordinator::new(config, services);
//!
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     coordinator.spawn_api_server(pages);
//!     image_batch_dl::run_with_shutdown(coordinator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Page-side ingress for scans and conversions
pub mod bridge;
/// Configuration types
pub mod config;
/// In-tab format conversion
pub mod converter;
/// Session coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Image byte retrieval
pub mod fetcher;
/// Page scan providers
pub mod scan;
/// User settings store
pub mod settings;
/// Staging and persistent storage
pub mod storage;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use bridge::PageBridge;
pub use config::{Config, DownloadConfig, FormatPolicy, TargetFormat, Theme};
pub use coordinator::{Collaborators, SessionCoordinator, SessionHandle, SessionSnapshot};
pub use db::Database;
pub use error::{
    ApiError, ConversionError, DatabaseError, Error, ErrorDetail, FetchError, Result,
    ToHttpStatus, WriteError,
};
pub use types::{
    DownloadItem, DownloadMetadata, Event, ImageCandidate, ItemStatus, Progress, ScanResult,
    SessionId, SourceType, TabId,
};

/// Run the coordinator until a termination signal, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(coordinator: SessionCoordinator) -> Result<()> {
    wait_for_signal().await;
    coordinator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
