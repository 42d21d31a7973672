//! Page-side ingress.
//!
//! Pages run outside this process. They push their scan results and serve
//! conversion jobs over the REST API; [`PageBridge`] turns those calls into the
//! in-process [`PublishedScanProvider`] and [`ChannelConverter`] the
//! coordinator is wired to.
//!
//! A conversion travels in three steps: the job is announced on the tab's job
//! stream, the page downloads the source bytes by job id, and the page posts
//! back either the re-encoded bytes or an error message.

use crate::config::{Config, TargetFormat};
use crate::converter::{ChannelConverter, ConvertJob, ConvertedImage};
use crate::coordinator::Collaborators;
use crate::error::{Error, Result};
use crate::scan::PublishedScanProvider;
use crate::types::{ScanResult, TabId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// A conversion job as announced to the page serving a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionNotice {
    /// Handle for fetching the source and posting the reply
    pub job_id: u64,
    /// Tab the job belongs to
    pub tab_id: TabId,
    /// Output format
    pub target: TargetFormat,
    /// Encoder quality in (0, 1]
    pub quality: f32,
    /// Size of the source bytes
    pub size: usize,
}

struct PendingConversion {
    tab: TabId,
    source: Bytes,
    reply: oneshot::Sender<std::result::Result<ConvertedImage, String>>,
}

/// Adapter between remote pages and the scan/convert collaborators
#[derive(Clone, Default)]
pub struct PageBridge {
    scanner: PublishedScanProvider,
    converter: ChannelConverter,
    pending: Arc<Mutex<HashMap<u64, PendingConversion>>>,
    next_job: Arc<AtomicU64>,
}

impl PageBridge {
    /// Bridge over a fresh scan provider and converter
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge over existing collaborators
    pub fn from_parts(scanner: PublishedScanProvider, converter: ChannelConverter) -> Self {
        Self {
            scanner,
            converter,
            ..Self::default()
        }
    }

    /// Scan provider fed by [`PageBridge::publish`]
    pub fn scanner(&self) -> &PublishedScanProvider {
        &self.scanner
    }

    /// Converter served through [`PageBridge::attach`]
    pub fn converter(&self) -> &ChannelConverter {
        &self.converter
    }

    /// Standard collaborators with this bridge as scan provider and converter.
    pub async fn collaborators(&self, config: &Config) -> Result<Collaborators> {
        Collaborators::open(
            config,
            Arc::new(self.scanner.clone()),
            Arc::new(self.converter.clone()),
        )
        .await
    }

    /// Store the scan result a page pushed for `tab`.
    pub async fn publish(&self, tab: TabId, result: ScanResult) {
        self.scanner.publish(tab, result).await;
    }

    /// Start serving conversions for `tab`.
    ///
    /// Replaces any previous job stream of the tab. Dropping the returned
    /// stream makes later conversions for the tab unreachable.
    pub async fn attach(
        &self,
        tab: TabId,
    ) -> impl Stream<Item = ConversionNotice> + Send + 'static + use<> {
        let jobs = self.converter.attach(tab).await;
        tracing::debug!(tab_id = %tab, "Page attached for conversions");

        let bridge = self.clone();
        ReceiverStream::new(jobs).map(move |job| bridge.register(tab, job))
    }

    /// Forget everything about `tab`: its scan, its job stream and the jobs
    /// still waiting on it.
    pub async fn close_tab(&self, tab: TabId) {
        self.scanner.remove(tab).await;
        self.converter.detach(tab).await;

        // Dropping the reply senders fails the waiting conversions as unreachable
        let dropped = {
            let mut pending = self.lock_pending();
            let before = pending.len();
            pending.retain(|_, job| job.tab != tab);
            before - pending.len()
        };
        tracing::debug!(tab_id = %tab, dropped_jobs = dropped, "Page closed");
    }

    /// Source bytes of a pending job.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownJob`] if the job is not pending.
    pub fn source(&self, job_id: u64) -> Result<Bytes> {
        self.lock_pending()
            .get(&job_id)
            .map(|job| job.source.clone())
            .ok_or(Error::UnknownJob(job_id))
    }

    /// Deliver the page's outcome for a pending job.
    ///
    /// `Err` carries the page's failure message. A reply that arrives after the
    /// session stopped waiting is accepted and dropped.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownJob`] if the job is not pending.
    pub fn complete(
        &self,
        job_id: u64,
        outcome: std::result::Result<ConvertedImage, String>,
    ) -> Result<()> {
        let job = self
            .lock_pending()
            .remove(&job_id)
            .ok_or(Error::UnknownJob(job_id))?;

        if job.reply.send(outcome).is_err() {
            tracing::debug!(
                job_id,
                tab_id = %job.tab,
                "Conversion reply arrived after the caller gave up"
            );
        }
        Ok(())
    }

    /// Number of jobs waiting for a page reply
    pub fn pending_jobs(&self) -> usize {
        self.lock_pending().len()
    }

    fn register(&self, tab: TabId, job: ConvertJob) -> ConversionNotice {
        let job_id = self.next_job.fetch_add(1, Ordering::Relaxed) + 1;
        let notice = ConversionNotice {
            job_id,
            tab_id: tab,
            target: job.request.target,
            quality: job.request.quality,
            size: job.request.bytes.len(),
        };

        let mut pending = self.lock_pending();
        // Timed-out callers leave closed senders behind
        pending.retain(|_, waiting| !waiting.reply.is_closed());
        pending.insert(
            job_id,
            PendingConversion {
                tab,
                source: job.request.bytes,
                reply: job.reply,
            },
        );

        notice
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, PendingConversion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
