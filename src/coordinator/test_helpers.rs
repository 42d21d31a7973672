//! Shared test helpers: in-memory collaborators and a coordinator harness.

use crate::config::{Config, DownloadConfig};
use crate::converter::{ChannelConverter, ConvertedImage};
use crate::coordinator::{Collaborators, SessionCoordinator};
use crate::error::{FetchError, WriteError};
use crate::fetcher::ResourceFetcher;
use crate::scan::PublishedScanProvider;
use crate::settings::MemorySettingsStore;
use crate::storage::{ConflictPolicy, StagedBlob, StorageSink, StoredFile};
use crate::types::{Event, ImageCandidate, ScanResult, SourceType, TabId};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, broadcast};

/// Fetcher serving canned responses, with optional latency and a start gate
#[derive(Default)]
pub(crate) struct MockFetcher {
    responses: std::sync::Mutex<HashMap<String, u16>>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    pub(crate) started: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` before answering
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every fetch waits for a permit from `gate` before answering
    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Answer `url` with `status` instead of 200
    pub(crate) fn respond(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
        self
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let status = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(200);
        if status == 200 {
            Ok(Bytes::from(format!("bytes of {url}")))
        } else {
            Err(FetchError::HttpStatus {
                status,
                url: url.to_string(),
            })
        }
    }
}

/// Storage sink keeping files in memory
#[derive(Default)]
pub(crate) struct MemoryStorageSink {
    pub(crate) files: Mutex<HashMap<String, Bytes>>,
    pub(crate) writes: Mutex<Vec<(String, ConflictPolicy)>>,
    reject: std::sync::Mutex<Vec<String>>,
    no_identifier: bool,
    next_id: AtomicUsize,
}

impl MemoryStorageSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject writes whose path ends with `suffix`
    pub(crate) fn reject(self, suffix: &str) -> Self {
        self.reject.lock().unwrap().push(suffix.to_string());
        self
    }

    /// Accept writes but report no identifier
    pub(crate) fn without_identifiers(mut self) -> Self {
        self.no_identifier = true;
        self
    }

    pub(crate) async fn file(&self, path: &str) -> Option<Bytes> {
        self.files.lock().await.get(path).cloned()
    }

    pub(crate) async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageSink for MemoryStorageSink {
    async fn write(
        &self,
        blob: &StagedBlob,
        path: &str,
        policy: ConflictPolicy,
    ) -> std::result::Result<StoredFile, WriteError> {
        self.writes.lock().await.push((path.to_string(), policy));

        let rejected = self
            .reject
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()));
        if rejected {
            return Err(WriteError::Rejected {
                path: path.to_string(),
                reason: "disk full".to_string(),
            });
        }

        let bytes = blob.open().await.ok_or(WriteError::BlobReleased(blob.id()))?;
        let mut files = self.files.lock().await;
        let mut final_path = path.to_string();
        if policy == ConflictPolicy::Uniquify {
            let mut n = 1;
            while files.contains_key(&final_path) {
                final_path = match path.rsplit_once('.') {
                    Some((stem, ext)) => format!("{stem} ({n}).{ext}"),
                    None => format!("{path} ({n})"),
                };
                n += 1;
            }
        }
        files.insert(final_path.clone(), bytes);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(StoredFile {
            id: (!self.no_identifier).then_some(id),
            path: PathBuf::from(final_path),
        })
    }
}

/// Serve conversions for `tab` from a background task
///
/// Every job succeeds with `converted-<target>` bytes and 640x480, unless
/// `fail_with` is set.
pub(crate) async fn serve_conversions(
    converter: &ChannelConverter,
    tab: TabId,
    fail_with: Option<&'static str>,
) {
    let mut jobs = converter.attach(tab).await;
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let reply = match fail_with {
                Some(message) => Err(message.to_string()),
                None => Ok(ConvertedImage {
                    bytes: Bytes::from(format!("converted-{}", job.request.target)),
                    width: 640,
                    height: 480,
                }),
            };
            let _ = job.reply.send(reply);
        }
    });
}

/// A coordinator wired to in-memory collaborators
pub(crate) struct Harness {
    pub(crate) coordinator: SessionCoordinator,
    pub(crate) fetcher: Arc<MockFetcher>,
    pub(crate) storage: Arc<MemoryStorageSink>,
    pub(crate) settings: Arc<MemorySettingsStore>,
    pub(crate) scanner: PublishedScanProvider,
    pub(crate) converter: ChannelConverter,
}

pub(crate) fn harness_with(
    settings: DownloadConfig,
    fetcher: MockFetcher,
    storage: MemoryStorageSink,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let storage = Arc::new(storage);
    let settings = Arc::new(MemorySettingsStore::new(settings));
    let scanner = PublishedScanProvider::new();
    let converter = ChannelConverter::new();

    let collaborators = Collaborators {
        fetcher: fetcher.clone(),
        converter: Arc::new(converter.clone()),
        storage: storage.clone(),
        scanner: Arc::new(scanner.clone()),
        settings: settings.clone(),
    };

    Harness {
        coordinator: SessionCoordinator::new(Config::default(), collaborators),
        fetcher,
        storage,
        settings,
        scanner,
        converter,
    }
}

pub(crate) fn harness(settings: DownloadConfig) -> Harness {
    harness_with(settings, MockFetcher::new(), MemoryStorageSink::new())
}

pub(crate) fn settings_with_concurrency(max_concurrency: usize) -> DownloadConfig {
    DownloadConfig {
        max_concurrency,
        ..DownloadConfig::default()
    }
}

pub(crate) fn candidate(url: &str) -> ImageCandidate {
    ImageCandidate::new(url, url, None, None, SourceType::Img)
}

pub(crate) fn candidates(count: usize) -> Vec<ImageCandidate> {
    (1..=count)
        .map(|n| candidate(&format!("https://img.example.com/photos/{n}.png")))
        .collect()
}

pub(crate) fn scan_result(title: &str, images: Vec<ImageCandidate>) -> ScanResult {
    ScanResult {
        page_title: title.to_string(),
        page_url: "https://example.com/gallery".to_string(),
        images,
    }
}

/// Drain every event currently buffered in `rx`
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait until `condition` holds, polling every few milliseconds
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
