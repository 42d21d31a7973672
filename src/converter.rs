//! Format conversion: re-encodes fetched bytes to PNG or JPEG.
//!
//! Decoding and re-encoding happen outside this crate, inside an execution
//! context bound to the originating tab. The coordinator only sees a
//! request/response call that may fail, through [`FormatConverter`].
//!
//! Two implementations ship with the crate:
//! - [`ChannelConverter`] - forwards requests to per-tab page contexts over
//!   channels and awaits their replies
//! - [`NoOpConverter`] - always unreachable, for deployments without a page
//!   context

use crate::config::TargetFormat;
use crate::error::ConversionError;
use crate::types::TabId;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

/// Capacity of each per-tab request channel
const TAB_CHANNEL_CAPACITY: usize = 16;

/// Conversion request
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Source bytes as fetched
    pub bytes: Bytes,
    /// Output format
    pub target: TargetFormat,
    /// Encoder quality in (0, 1]; only meaningful for JPEG
    pub quality: f32,
}

/// Conversion output
#[must_use]
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    /// Re-encoded bytes
    pub bytes: Bytes,
    /// Pixel width of the decoded image
    pub width: u32,
    /// Pixel height of the decoded image
    pub height: u32,
}

/// Trait for the external conversion capability
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Convert `request.bytes` to `request.target` within the context of `tab`.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Unreachable`] when the tab's context is gone,
    /// [`ConversionError::Failed`] when the converter reports a failure.
    async fn convert(
        &self,
        tab: TabId,
        request: ConvertRequest,
    ) -> std::result::Result<ConvertedImage, ConversionError>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Converter used when no page context is available
pub struct NoOpConverter;

#[async_trait]
impl FormatConverter for NoOpConverter {
    async fn convert(
        &self,
        tab: TabId,
        _request: ConvertRequest,
    ) -> std::result::Result<ConvertedImage, ConversionError> {
        Err(ConversionError::Unreachable(format!(
            "no converter available for tab {}",
            tab
        )))
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// A conversion job delivered to a page context
#[derive(Debug)]
pub struct ConvertJob {
    /// What to convert
    pub request: ConvertRequest,
    /// Where to send the outcome; `Err` carries the converter's message
    pub reply: oneshot::Sender<std::result::Result<ConvertedImage, String>>,
}

/// Converter that forwards jobs to page contexts attached per tab
///
/// A page context calls [`ChannelConverter::attach`] and serves the returned
/// receiver. Dropping the receiver (or calling [`ChannelConverter::detach`])
/// makes further conversions for that tab fail as unreachable.
#[derive(Clone, Default)]
pub struct ChannelConverter {
    tabs: Arc<Mutex<HashMap<TabId, mpsc::Sender<ConvertJob>>>>,
}

impl ChannelConverter {
    /// Create a converter with no attached tabs
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a page context for `tab`, replacing any previous one.
    pub async fn attach(&self, tab: TabId) -> mpsc::Receiver<ConvertJob> {
        let (tx, rx) = mpsc::channel(TAB_CHANNEL_CAPACITY);
        self.tabs.lock().await.insert(tab, tx);
        rx
    }

    /// Detach the page context for `tab`.
    pub async fn detach(&self, tab: TabId) {
        self.tabs.lock().await.remove(&tab);
    }
}

#[async_trait]
impl FormatConverter for ChannelConverter {
    async fn convert(
        &self,
        tab: TabId,
        request: ConvertRequest,
    ) -> std::result::Result<ConvertedImage, ConversionError> {
        let sender = {
            let tabs = self.tabs.lock().await;
            tabs.get(&tab).cloned()
        }
        .ok_or_else(|| ConversionError::Unreachable(format!("tab {} is not attached", tab)))?;

        let (reply, response) = oneshot::channel();
        sender
            .send(ConvertJob { request, reply })
            .await
            .map_err(|_| ConversionError::Unreachable(format!("tab {} context is gone", tab)))?;

        match response.await {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(message)) if message.is_empty() => {
                Err(ConversionError::Failed("conversion failed".to_string()))
            }
            Ok(Err(message)) => Err(ConversionError::Failed(message)),
            Err(_) => Err(ConversionError::Unreachable(format!(
                "tab {} dropped the conversion request",
                tab
            ))),
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
