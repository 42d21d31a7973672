//! Persistence sink: writes finished files under the download directory.
//!
//! Paths handed to the sink are relative (`"<folder>/<filename>"`); the sink
//! resolves them under its root and applies a [`ConflictPolicy`].

use crate::error::WriteError;
use crate::utils::numbered_path;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

pub mod staging;

pub use staging::{StagedBlob, StagingArea};

/// Highest `(N)` suffix tried before giving up on a unique name
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// What to do when the destination already exists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Pick a free `name (N).ext` next to the requested path
    Uniquify,
    /// Replace the existing file
    Overwrite,
}

/// Receipt for a completed write
#[must_use]
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Identifier assigned by the sink; `None` means the sink did not confirm
    pub id: Option<u64>,
    /// Where the bytes ended up
    pub path: PathBuf,
}

/// Trait for durable storage of finished files
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Write `blob` to the relative `path` using `policy`.
    ///
    /// # Errors
    ///
    /// [`WriteError::Rejected`] for invalid paths or I/O failures,
    /// [`WriteError::BlobReleased`] if the blob is gone before it is read.
    async fn write(
        &self,
        blob: &StagedBlob,
        path: &str,
        policy: ConflictPolicy,
    ) -> std::result::Result<StoredFile, WriteError>;
}

/// Filesystem-backed [`StorageSink`]
#[derive(Clone)]
pub struct FsStorageSink {
    root: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl FsStorageSink {
    /// Create a sink rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative sink path under the root, refusing escapes.
    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, WriteError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if path.is_empty() || escapes || relative.file_name().is_none() {
            return Err(WriteError::Rejected {
                path: path.to_string(),
                reason: "path must be a relative file path inside the download directory"
                    .to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn rejected(path: &str, reason: impl std::fmt::Display) -> WriteError {
    WriteError::Rejected {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl StorageSink for FsStorageSink {
    async fn write(
        &self,
        blob: &StagedBlob,
        path: &str,
        policy: ConflictPolicy,
    ) -> std::result::Result<StoredFile, WriteError> {
        let target = self.resolve(path)?;
        let bytes = blob
            .open()
            .await
            .ok_or(WriteError::BlobReleased(blob.id()))?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| rejected(path, format!("failed to create directory: {}", e)))?;
        }

        let final_path = match policy {
            ConflictPolicy::Overwrite => {
                tokio::fs::write(&target, &bytes)
                    .await
                    .map_err(|e| rejected(path, e))?;
                target
            }
            ConflictPolicy::Uniquify => {
                let mut claimed = None;
                // create_new is the existence check
                for n in 0..=MAX_RENAME_ATTEMPTS {
                    let Some(candidate) = numbered_path(&target, n) else {
                        return Err(rejected(path, "file name is not valid UTF-8"));
                    };
                    match tokio::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&candidate)
                        .await
                    {
                        Ok(mut file) => {
                            file.write_all(&bytes).await.map_err(|e| rejected(path, e))?;
                            file.flush().await.map_err(|e| rejected(path, e))?;
                            claimed = Some(candidate);
                            break;
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                        Err(e) => return Err(rejected(path, e)),
                    }
                }
                claimed.ok_or_else(|| rejected(path, "could not claim a unique filename"))?
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            file_id = id,
            path = %final_path.display(),
            bytes = bytes.len(),
            mime = blob.mime(),
            "Stored file"
        );

        Ok(StoredFile {
            id: Some(id),
            path: final_path,
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    async fn staged(area: &StagingArea, data: &'static [u8]) -> StagedBlob {
        area.stage(Bytes::from_static(data), "image/png").await
    }

    #[tokio::test]
    async fn writes_under_root_and_creates_folder() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();
        let blob = staged(&area, b"png").await;

        let stored = sink
            .write(&blob, "My Page/a.png", ConflictPolicy::Uniquify)
            .await
            .unwrap();

        assert_eq!(stored.path, temp_dir.path().join("My Page").join("a.png"));
        assert!(stored.id.is_some());
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"png");
    }

    #[tokio::test]
    async fn uniquify_keeps_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();

        let first = sink
            .write(&staged(&area, b"one").await, "f/a.png", ConflictPolicy::Uniquify)
            .await
            .unwrap();
        let second = sink
            .write(&staged(&area, b"two").await, "f/a.png", ConflictPolicy::Uniquify)
            .await
            .unwrap();

        assert_eq!(second.path, temp_dir.path().join("f").join("a (1).png"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");
        assert_eq!(std::fs::read(&second.path).unwrap(), b"two");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn uniquify_skips_every_taken_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("f");
        std::fs::create_dir_all(&folder).unwrap();
        for name in ["a.png", "a (1).png", "a (2).png"] {
            std::fs::write(folder.join(name), b"taken").unwrap();
        }
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();

        let stored = sink
            .write(&staged(&area, b"new").await, "f/a.png", ConflictPolicy::Uniquify)
            .await
            .unwrap();

        assert_eq!(stored.path, folder.join("a (3).png"));
        assert_eq!(std::fs::read(folder.join("a (1).png")).unwrap(), b"taken");
    }

    #[tokio::test]
    async fn concurrent_uniquify_writers_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();

        let mut writes = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let sink = sink.clone();
            let blob = staged(&area, b"same").await;
            writes.spawn(async move {
                sink.write(&blob, "f/a.png", ConflictPolicy::Uniquify)
                    .await
                    .unwrap()
                    .path
            });
        }

        let mut paths = Vec::new();
        while let Some(path) = writes.join_next().await {
            paths.push(path.unwrap());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();

        sink.write(
            &staged(&area, b"old").await,
            "f/metadata.json",
            ConflictPolicy::Overwrite,
        )
        .await
        .unwrap();
        let stored = sink
            .write(
                &staged(&area, b"new").await,
                "f/metadata.json",
                ConflictPolicy::Overwrite,
            )
            .await
            .unwrap();

        assert_eq!(stored.path, temp_dir.path().join("f").join("metadata.json"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn rejects_paths_escaping_root() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();
        let blob = staged(&area, b"x").await;

        for bad in ["../a.png", "/etc/a.png", "", "f/../../a.png"] {
            let err = sink
                .write(&blob, bad, ConflictPolicy::Uniquify)
                .await
                .unwrap_err();
            assert!(matches!(err, WriteError::Rejected { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn released_blob_cannot_be_written() {
        let temp_dir = TempDir::new().unwrap();
        let sink = FsStorageSink::new(temp_dir.path());
        let area = StagingArea::new();
        let blob = staged(&area, b"x").await;
        area.release(blob.id()).await;

        let err = sink
            .write(&blob, "f/a.png", ConflictPolicy::Uniquify)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::BlobReleased(_)));
    }
}
