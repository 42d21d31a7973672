//! Page scanning.
//!
//! Discovering candidates inside a page is done by the page itself; the
//! coordinator only asks a [`ScanProvider`] for the result.

use crate::types::{ImageCandidate, ScanResult, SourceType, TabId, candidate_id};
use crate::utils::{guess_format, pick_best_from_srcset};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for retrieving the image candidates of a tab
#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// Scan the page shown in `tab`.
    ///
    /// # Errors
    ///
    /// [`Error::Scan`] when the page cannot be reached.
    async fn scan(&self, tab: TabId, include_background_images: bool) -> Result<ScanResult>;
}

/// Scan provider serving results that pages publish per tab
///
/// A page publishes everything it found, background images included;
/// [`ScanProvider::scan`] filters background images out unless asked for them.
/// Candidates carrying a `srcset` are upgraded to its highest-resolution entry
/// on publish.
#[derive(Clone, Default)]
pub struct PublishedScanProvider {
    pages: Arc<RwLock<HashMap<TabId, ScanResult>>>,
}

impl PublishedScanProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the scan result of `tab`.
    pub async fn publish(&self, tab: TabId, mut result: ScanResult) {
        let base = url::Url::parse(&result.page_url).ok();
        for image in &mut result.images {
            upgrade_from_srcset(image, base.as_ref());
        }
        tracing::debug!(tab_id = %tab, images = result.images.len(), "Page published scan");
        self.pages.write().await.insert(tab, result);
    }

    /// Forget `tab`, e.g. when it closes.
    pub async fn remove(&self, tab: TabId) -> bool {
        self.pages.write().await.remove(&tab).is_some()
    }
}

/// Point `best_url` at the best `srcset` entry, resolved against the page URL.
fn upgrade_from_srcset(image: &mut ImageCandidate, base: Option<&url::Url>) {
    let Some(best) = image.srcset.as_deref().and_then(pick_best_from_srcset) else {
        return;
    };
    let best = match base.and_then(|base| base.join(&best).ok()) {
        Some(resolved) => resolved.to_string(),
        None => best,
    };
    if best == image.best_url {
        return;
    }

    image.id = candidate_id(&best, image.width, image.height);
    image.format = guess_format(&best);
    image.best_url = best;
}

#[async_trait]
impl ScanProvider for PublishedScanProvider {
    async fn scan(&self, tab: TabId, include_background_images: bool) -> Result<ScanResult> {
        let pages = self.pages.read().await;
        let mut result = pages
            .get(&tab)
            .cloned()
            .ok_or_else(|| Error::Scan(format!("no page is attached to tab {}", tab)))?;

        if !include_background_images {
            result
                .images
                .retain(|image| image.source_type != SourceType::Background);
        }

        Ok(result)
    }
}
