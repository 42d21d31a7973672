//! Task execution: fetch, optional conversion, staging and write of one candidate.

use crate::config::{FormatPolicy, NetworkConfig};
use crate::converter::{ConvertRequest, FormatConverter};
use crate::error::{ConversionError, Error, FetchError, WriteError};
use crate::fetcher::ResourceFetcher;
use crate::storage::{ConflictPolicy, StagingArea, StorageSink};
use crate::types::{DownloadItem, ImageCandidate, ItemStatus, SessionId, TabId};
use crate::utils::{FALLBACK_FORMAT, build_filename, format_to_mime, guess_format};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::SessionCoordinator;
use super::session::{QueuedTask, SessionHandle};

/// Message recorded when a failure carries no text of its own
pub(crate) const DEFAULT_FAILURE_MESSAGE: &str = "download failed";

/// How a task ended
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    /// The session was cancelled before the task started; nothing is recorded
    Dropped { index: usize },
    /// The task produced a terminal record
    Settled { index: usize, item: DownloadItem },
}

/// Shared context for the tasks of one session
pub(crate) struct TaskContext {
    pub(crate) session_id: SessionId,
    pub(crate) tab: TabId,
    pub(crate) folder: String,
    pub(crate) format_policy: FormatPolicy,
    pub(crate) jpg_quality: f32,
    pub(crate) network: NetworkConfig,
    pub(crate) blob_release_delay: Duration,
    pub(crate) fetcher: Arc<dyn ResourceFetcher>,
    pub(crate) converter: Arc<dyn FormatConverter>,
    pub(crate) storage: Arc<dyn StorageSink>,
    pub(crate) staging: StagingArea,
    pub(crate) cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn for_session(coordinator: &SessionCoordinator, handle: &SessionHandle) -> Self {
        Self {
            session_id: handle.id.clone(),
            tab: handle.tab,
            folder: handle.folder.clone(),
            format_policy: handle.config.default_format,
            jpg_quality: handle.config.jpg_quality,
            network: coordinator.config.network.clone(),
            blob_release_delay: coordinator.config.storage.blob_release_delay,
            fetcher: Arc::clone(&coordinator.services.fetcher),
            converter: Arc::clone(&coordinator.services.converter),
            storage: Arc::clone(&coordinator.services.storage),
            staging: coordinator.staging.clone(),
            cancel: handle.cancel.clone(),
        }
    }
}

/// Await `fut`, bounded by `limit` when one is configured
pub(crate) async fn bounded<T, E>(
    limit: Option<Duration>,
    fut: impl Future<Output = std::result::Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> std::result::Result<T, E> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(on_timeout(limit))),
        None => fut.await,
    }
}

/// Output of a successful task before it is recorded
struct Written {
    filename: String,
    format: String,
    width: Option<u32>,
    height: Option<u32>,
    bytes: u64,
}

/// Execute one task
///
/// Cancellation is only checked on entry: once a task has started, its fetch,
/// conversion and write run to completion.
pub(crate) async fn execute_task(ctx: Arc<TaskContext>, task: QueuedTask) -> TaskOutcome {
    if ctx.cancel.is_cancelled() {
        return TaskOutcome::Dropped { index: task.index };
    }

    let item = match run(&ctx, &task).await {
        Ok(written) => {
            tracing::debug!(
                session_id = %ctx.session_id,
                index = task.index,
                filename = %written.filename,
                bytes = written.bytes,
                "Task completed"
            );
            DownloadItem {
                id: task.candidate.id.clone(),
                filename: written.filename,
                folder: ctx.folder.clone(),
                download_url: task.candidate.best_url.clone(),
                original_url: task.candidate.original_url.clone(),
                width: written.width,
                height: written.height,
                format: Some(written.format),
                status: ItemStatus::Done,
                bytes: Some(written.bytes),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(
                session_id = %ctx.session_id,
                index = task.index,
                url = %task.candidate.best_url,
                error = %e,
                "Task failed"
            );
            failed_item(&ctx.folder, &task, &e.to_string())
        }
    };

    TaskOutcome::Settled {
        index: task.index,
        item,
    }
}

async fn run(ctx: &TaskContext, task: &QueuedTask) -> crate::Result<Written> {
    let candidate = &task.candidate;

    let fetched = bounded(
        ctx.network.fetch_timeout,
        ctx.fetcher.fetch(&candidate.best_url),
        FetchError::Timeout,
    )
    .await?;

    let mut format = declared_format(candidate)
        .map(str::to_string)
        .or_else(|| guess_format(&candidate.best_url))
        .unwrap_or_else(|| FALLBACK_FORMAT.to_string());
    let mut bytes = fetched;
    let mut width = candidate.width;
    let mut height = candidate.height;

    if let Some(target) = ctx.format_policy.target() {
        let request = ConvertRequest {
            bytes,
            target,
            quality: ctx.jpg_quality,
        };
        let converted = bounded(
            ctx.network.convert_timeout,
            ctx.converter.convert(ctx.tab, request),
            ConversionError::Timeout,
        )
        .await?;

        bytes = converted.bytes;
        format = target.as_str().to_string();
        width = Some(converted.width);
        height = Some(converted.height);
    }

    let filename = build_filename(candidate, task.index, &format);
    let path = format!("{}/{}", ctx.folder, filename);
    let blob = ctx.staging.stage(bytes, format_to_mime(&format)).await;

    let written = bounded(
        ctx.network.write_timeout,
        ctx.storage.write(&blob, &path, ConflictPolicy::Uniquify),
        WriteError::Timeout,
    )
    .await;
    // Released on a timer whatever the outcome, so the sink can finish reading
    ctx.staging.schedule_release(&blob, ctx.blob_release_delay);

    let stored = written?;
    if stored.id.is_none() {
        return Err(Error::Write(WriteError::NoIdentifier { path }));
    }

    Ok(Written {
        filename,
        format,
        width,
        height,
        bytes: blob.len() as u64,
    })
}

/// The candidate's own format tag; an empty tag counts as unknown
fn declared_format(candidate: &ImageCandidate) -> Option<&str> {
    candidate.format.as_deref().filter(|f| !f.is_empty())
}

/// Terminal record for a task that did not produce output
///
/// The filename is derived from the candidate's own format since no
/// conversion output exists.
pub(crate) fn failed_item(folder: &str, task: &QueuedTask, message: &str) -> DownloadItem {
    let candidate = &task.candidate;
    let format = declared_format(candidate).unwrap_or(FALLBACK_FORMAT);
    let error = if message.is_empty() {
        DEFAULT_FAILURE_MESSAGE.to_string()
    } else {
        message.to_string()
    };

    DownloadItem {
        id: candidate.id.clone(),
        filename: build_filename(candidate, task.index, format),
        folder: folder.to_string(),
        download_url: candidate.best_url.clone(),
        original_url: candidate.original_url.clone(),
        width: candidate.width,
        height: candidate.height,
        format: declared_format(candidate).map(str::to_string),
        status: ItemStatus::Failed,
        bytes: None,
        error: Some(error),
    }
}
