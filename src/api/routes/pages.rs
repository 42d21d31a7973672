//! Page handlers: scans, page-load notifications, and the ingress pages use
//! to publish scans and serve conversions.

use super::{
    Ack, ConversionFailure, ConvertedQuery, PageLoadedRequest, PublishScanRequest, ScanRequest,
};
use crate::api::AppState;
use crate::converter::ConvertedImage;
use crate::error::Result;
use crate::types::{ScanResult, TabId};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};

/// POST /scan - Scan a tab for image candidates
pub async fn scan_tab(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<Ack<ScanResult>>> {
    let result = state.coordinator.scan(request.tab_id).await?;
    Ok(Json(Ack::with_data(result)))
}

/// POST /pages/loaded - A tab finished loading
///
/// Starts an auto-download session when the user enabled it. Scan failures on
/// this path are logged, not returned: the caller is a fire-and-forget
/// notification.
pub async fn page_loaded(
    State(state): State<AppState>,
    Json(request): Json<PageLoadedRequest>,
) -> Json<Ack<Value>> {
    let started = match state
        .coordinator
        .page_loaded(request.tab_id, &request.url)
        .await
    {
        Ok(handle) => handle.map(|h| h.id().to_string()),
        Err(e) => {
            tracing::warn!(tab_id = %request.tab_id, error = %e, "Auto-download failed");
            None
        }
    };

    Json(Ack::with_data(json!({ "sessionId": started })))
}

/// POST /pages/scan - A page publishes its scan result
pub async fn publish_scan(
    State(state): State<AppState>,
    Json(request): Json<PublishScanRequest>,
) -> Json<Ack> {
    state.pages.publish(request.tab_id, request.scan).await;
    Json(Ack::ok())
}

/// POST /pages/closed - A tab closed
///
/// Drops its scan, its conversion stream and its auto-download memory.
pub async fn page_closed(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Json<Ack> {
    state.pages.close_tab(request.tab_id).await;
    state.coordinator.forget_tab(request.tab_id).await;
    Json(Ack::ok())
}

/// GET /pages/:tab_id/conversions - Conversion jobs for a tab
///
/// Each job arrives as a `conversion_job` event. Closing the stream detaches
/// the tab, so later conversions for it fail as unreachable.
pub async fn conversion_jobs(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let jobs = state.pages.attach(TabId(tab_id)).await;

    let sse_stream = jobs.filter_map(|notice| match serde_json::to_string(&notice) {
        Ok(json_data) => Some(Ok(SseEvent::default()
            .event("conversion_job")
            .data(json_data))),
        Err(e) => {
            tracing::warn!("Failed to serialize conversion job to JSON: {}", e);
            None
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// GET /conversions/:job_id/source - Source bytes of a pending job
pub async fn conversion_source(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
) -> Result<impl IntoResponse> {
    let source = state.pages.source(job_id)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], source))
}

/// POST /conversions/:job_id - The page's converted bytes
pub async fn complete_conversion(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
    Query(size): Query<ConvertedQuery>,
    body: Bytes,
) -> Result<Json<Ack>> {
    state.pages.complete(
        job_id,
        Ok(ConvertedImage {
            bytes: body,
            width: size.width,
            height: size.height,
        }),
    )?;
    Ok(Json(Ack::ok()))
}

/// POST /conversions/:job_id/error - The page could not convert the job
pub async fn fail_conversion(
    State(state): State<AppState>,
    Path(job_id): Path<u64>,
    Json(failure): Json<ConversionFailure>,
) -> Result<Json<Ack>> {
    state.pages.complete(job_id, Err(failure.message))?;
    Ok(Json(Ack::ok()))
}
