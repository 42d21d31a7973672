//! User settings store.
//!
//! Reads never fail: stored values are merged over [`DownloadConfig::default`]
//! and any storage or decoding problem yields the defaults.

use crate::config::DownloadConfig;
use crate::db::Database;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Key under which the download settings document is stored
pub const SETTINGS_KEY: &str = "download";

/// Capacity of the change-notification channel
const CHANGE_BUFFER: usize = 16;

/// Trait for persistent user settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings, normalized. Never fails.
    async fn get(&self) -> DownloadConfig;

    /// Persist `config` and notify subscribers.
    async fn set(&self, config: DownloadConfig) -> Result<()>;

    /// Receive every successfully stored configuration.
    fn subscribe(&self) -> broadcast::Receiver<DownloadConfig>;
}

/// Merge a stored JSON document over the defaults.
///
/// Unknown keys are ignored. Returns `None` when the document is not an object
/// or the merged result does not decode.
pub fn merge_over_defaults(stored: &str) -> Option<DownloadConfig> {
    let stored: serde_json::Value = serde_json::from_str(stored).ok()?;
    let serde_json::Value::Object(stored) = stored else {
        return None;
    };
    let mut merged = serde_json::to_value(DownloadConfig::default()).ok()?;
    if let serde_json::Value::Object(fields) = &mut merged {
        fields.extend(stored);
    }
    serde_json::from_value::<DownloadConfig>(merged)
        .ok()
        .map(DownloadConfig::normalized)
}

/// [`SettingsStore`] backed by the SQLite settings table
pub struct DbSettingsStore {
    db: Arc<Database>,
    changes: broadcast::Sender<DownloadConfig>,
}

impl DbSettingsStore {
    /// Wrap an open database
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { db, changes }
    }
}

#[async_trait]
impl SettingsStore for DbSettingsStore {
    async fn get(&self) -> DownloadConfig {
        let row = match self.db.get_setting(SETTINGS_KEY).await {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read settings, using defaults");
                return DownloadConfig::default();
            }
        };

        match row {
            None => DownloadConfig::default(),
            Some(row) => merge_over_defaults(&row.value).unwrap_or_else(|| {
                tracing::warn!(
                    updated_at = row.updated_at,
                    "Stored settings are malformed, using defaults"
                );
                DownloadConfig::default()
            }),
        }
    }

    async fn set(&self, config: DownloadConfig) -> Result<()> {
        let config = config.normalized();
        let value = serde_json::to_string(&config)?;
        self.db.put_setting(SETTINGS_KEY, &value).await?;

        tracing::info!(
            default_format = ?config.default_format,
            max_concurrency = config.max_concurrency,
            auto_download = config.auto_download,
            "Settings updated"
        );

        self.changes.send(config).ok();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DownloadConfig> {
        self.changes.subscribe()
    }
}

/// In-memory [`SettingsStore`] (nothing survives a restart)
pub struct MemorySettingsStore {
    config: RwLock<DownloadConfig>,
    changes: broadcast::Sender<DownloadConfig>,
}

impl MemorySettingsStore {
    /// Start from `config`
    pub fn new(config: DownloadConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            config: RwLock::new(config.normalized()),
            changes,
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(DownloadConfig::default())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self) -> DownloadConfig {
        self.config.read().await.clone()
    }

    async fn set(&self, config: DownloadConfig) -> Result<()> {
        let config = config.normalized();
        *self.config.write().await = config.clone();
        self.changes.send(config).ok();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DownloadConfig> {
        self.changes.subscribe()
    }
}
