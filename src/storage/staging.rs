//! Transient blob staging.
//!
//! Bytes headed for the storage sink are first staged here and handed over as
//! a [`StagedBlob`] handle. Each handle is released a fixed interval after its
//! write completes, regardless of the write's outcome, so the sink can finish
//! reading it without the staging area growing without bound.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

struct StagedEntry {
    bytes: Bytes,
}

/// Registry of staged blobs (cloneable, all state is shared)
#[derive(Clone, Default)]
pub struct StagingArea {
    entries: Arc<Mutex<HashMap<u64, StagedEntry>>>,
    next_id: Arc<AtomicU64>,
}

/// Handle to a staged blob
#[derive(Clone)]
pub struct StagedBlob {
    id: u64,
    mime: &'static str,
    len: usize,
    area: StagingArea,
}

impl std::fmt::Debug for StagedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedBlob")
            .field("id", &self.id)
            .field("mime", &self.mime)
            .field("len", &self.len)
            .finish()
    }
}

impl StagingArea {
    /// Create an empty staging area
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `bytes` with the given content type and return its handle.
    pub async fn stage(&self, bytes: Bytes, mime: &'static str) -> StagedBlob {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let len = bytes.len();
        self.entries.lock().await.insert(id, StagedEntry { bytes });
        StagedBlob {
            id,
            mime,
            len,
            area: self.clone(),
        }
    }

    /// Release a blob immediately. Returns whether it was still staged.
    pub async fn release(&self, id: u64) -> bool {
        self.entries.lock().await.remove(&id).is_some()
    }

    /// Release `blob` after `delay` on a background task.
    pub fn schedule_release(&self, blob: &StagedBlob, delay: Duration) -> tokio::task::JoinHandle<()> {
        let area = self.clone();
        let id = blob.id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if area.release(id).await {
                tracing::trace!(blob_id = id, "Released staged blob");
            }
        })
    }

    /// Number of blobs currently staged
    pub async fn staged_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl StagedBlob {
    /// Blob identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Content type the blob was staged with
    pub fn mime(&self) -> &'static str {
        self.mime
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the blob is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the blob's bytes, or `None` once it has been released.
    pub async fn open(&self) -> Option<Bytes> {
        let entries = self.area.entries.lock().await;
        entries.get(&self.id).map(|entry| entry.bytes.clone())
    }
}
