//! Common helpers for image-batch-dl end-to-end tests

#![allow(dead_code)]

use image_batch_dl::converter::{ChannelConverter, ConvertedImage};
use image_batch_dl::scan::PublishedScanProvider;
use image_batch_dl::{
    Collaborators, Config, Event, ImageCandidate, ScanResult, SessionCoordinator, SourceType,
    TabId,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// A coordinator wired to the production collaborators inside a temp dir
pub struct TestService {
    pub coordinator: SessionCoordinator,
    pub scanner: PublishedScanProvider,
    pub converter: ChannelConverter,
    pub config: Config,
    /// Keep alive for the test duration
    pub temp_dir: TempDir,
}

/// Service config rooted in `dir`
pub fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.download_dir = dir.path().join("downloads");
    config.persistence.database_path = dir.path().join("settings.db");
    config.storage.blob_release_delay = Duration::from_millis(50);
    config
}

/// Open the standard collaborators (HTTP fetcher, filesystem sink, SQLite settings)
pub async fn open_service(temp_dir: TempDir) -> TestService {
    let config = config_in(&temp_dir);
    let scanner = PublishedScanProvider::new();
    let converter = ChannelConverter::new();

    let services = Collaborators::open(
        &config,
        Arc::new(scanner.clone()),
        Arc::new(converter.clone()),
    )
    .await
    .expect("collaborators should open");

    TestService {
        coordinator: SessionCoordinator::new(config.clone(), services),
        scanner,
        converter,
        config,
        temp_dir,
    }
}

pub async fn create_test_service() -> TestService {
    open_service(tempfile::tempdir().expect("temp dir")).await
}

/// Answer every conversion job for `tab` with a fixed payload
pub async fn serve_conversions(converter: &ChannelConverter, tab: TabId, payload: &'static [u8]) {
    let mut jobs = converter.attach(tab).await;
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let _ = job.reply.send(Ok(ConvertedImage {
                bytes: bytes::Bytes::from_static(payload),
                width: 2,
                height: 2,
            }));
        }
    });
}

pub fn image(url: &str) -> ImageCandidate {
    ImageCandidate::new(url, url, Some(100), Some(80), SourceType::Img)
}

pub fn page(title: &str, images: Vec<ImageCandidate>) -> ScanResult {
    ScanResult {
        page_title: title.to_string(),
        page_url: "https://example.com/gallery".to_string(),
        images,
    }
}

/// Collect events until `stop` matches one, or fail after 10s
pub async fn collect_until(
    rx: &mut broadcast::Receiver<Event>,
    stop: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut events = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = stop(&event);
                    events.push(event);
                    if done {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await
    .expect("expected event not received within 10s");
    events
}
