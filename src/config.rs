//! Configuration types for image-batch-dl
//!
//! Two layers of configuration exist:
//! - [`Config`] - service configuration fixed at construction (directories,
//!   timeouts, database location, API binding)
//! - [`DownloadConfig`] - user settings held by the settings store, snapshotted
//!   into every session when it starts

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Lower bound for [`DownloadConfig::max_concurrency`]
pub const MIN_CONCURRENCY: usize = 1;
/// Upper bound for [`DownloadConfig::max_concurrency`]
pub const MAX_CONCURRENCY: usize = 10;

/// Target format policy for downloaded images
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatPolicy {
    /// Keep the bytes as fetched
    #[default]
    Original,
    /// Re-encode to PNG
    Png,
    /// Re-encode to JPEG
    Jpg,
}

impl FormatPolicy {
    /// The converter target for this policy, or `None` to keep the original
    pub fn target(self) -> Option<TargetFormat> {
        match self {
            FormatPolicy::Original => None,
            FormatPolicy::Png => Some(TargetFormat::Png),
            FormatPolicy::Jpg => Some(TargetFormat::Jpg),
        }
    }
}

/// Output formats the converter can produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// PNG
    Png,
    /// JPEG
    Jpg,
}

impl TargetFormat {
    /// Extension-style tag (`png` / `jpg`)
    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpg => "jpg",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI colour theme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme
    Light,
    /// Dark theme
    Dark,
    /// Follow the system preference
    #[default]
    System,
}

/// User download settings
///
/// Stored by the settings store. Every field has a default so a partial stored
/// value can be merged over [`DownloadConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    /// Target format policy (default: original)
    #[serde(default)]
    pub default_format: FormatPolicy,

    /// JPEG quality in (0, 1] (default: 0.9)
    #[serde(default = "default_jpg_quality")]
    pub jpg_quality: f32,

    /// Start a download automatically when a page finishes loading (default: false)
    #[serde(default)]
    pub auto_download: bool,

    /// Include CSS background images when scanning (default: false)
    #[serde(default)]
    pub include_background_images: bool,

    /// UI theme (default: system)
    #[serde(default)]
    pub theme: Theme,

    /// Maximum concurrent downloads per session, 1–10 (default: 4)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_format: FormatPolicy::default(),
            jpg_quality: default_jpg_quality(),
            auto_download: false,
            include_background_images: false,
            theme: Theme::default(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl DownloadConfig {
    /// Clamp out-of-range values into their valid domain.
    ///
    /// `max_concurrency` is clamped to 1–10. A non-finite or non-positive
    /// `jpg_quality` falls back to the default; values above 1 become 1.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_concurrency = self.max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        if !self.jpg_quality.is_finite() || self.jpg_quality <= 0.0 {
            self.jpg_quality = default_jpg_quality();
        } else if self.jpg_quality > 1.0 {
            self.jpg_quality = 1.0;
        }
        self
    }
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory under which session folders are created (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// How long a staged blob stays alive after its write completes (default: 10s)
    #[serde(default = "default_blob_release_delay")]
    pub blob_release_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            blob_release_delay: default_blob_release_delay(),
        }
    }
}

/// Network and per-step time bounds
///
/// `None` disables the bound for that step; a stalled step then holds its
/// concurrency slot until it returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bound on a single image fetch (default: 60s)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: Option<Duration>,

    /// Bound on a single conversion round-trip (default: 30s)
    #[serde(default = "default_convert_timeout")]
    pub convert_timeout: Option<Duration>,

    /// Bound on a single storage write (default: 30s)
    #[serde(default = "default_write_timeout")]
    pub write_timeout: Option<Duration>,

    /// User-Agent header sent with fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            convert_timeout: default_convert_timeout(),
            write_timeout: default_write_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database holding user settings (default: "./image-batch-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// API and external server integration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Main service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Output directory and blob staging
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fetch/convert/write bounds
    #[serde(default)]
    pub network: NetworkConfig,

    /// Settings database
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API
    #[serde(default)]
    pub server: ServerIntegrationConfig,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            network: NetworkConfig::default(),
            persistence: PersistenceConfig::default(),
            server: ServerIntegrationConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.storage.download_dir
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("image-batch-dl.db")
}

fn default_blob_release_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_fetch_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_convert_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_write_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_user_agent() -> String {
    format!("image-batch-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_jpg_quality() -> f32 {
    0.9
}

fn default_max_concurrency() -> usize {
    4
}

fn default_event_buffer() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_config_defaults_match_extension_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.default_format, FormatPolicy::Original);
        assert!((config.jpg_quality - 0.9).abs() < f32::EPSILON);
        assert!(!config.auto_download);
        assert!(!config.include_background_images);
        assert_eq!(config.theme, Theme::System);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let config: DownloadConfig =
            serde_json::from_str(r#"{"defaultFormat":"png","maxConcurrency":2}"#).unwrap();

        assert_eq!(config.default_format, FormatPolicy::Png);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.theme, Theme::System);
        assert!((config.jpg_quality - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn normalized_clamps_concurrency_into_range() {
        let low = DownloadConfig {
            max_concurrency: 0,
            ..DownloadConfig::default()
        };
        let high = DownloadConfig {
            max_concurrency: 64,
            ..DownloadConfig::default()
        };

        assert_eq!(low.normalized().max_concurrency, 1);
        assert_eq!(high.normalized().max_concurrency, 10);
    }

    #[test]
    fn normalized_repairs_quality() {
        let zero = DownloadConfig {
            jpg_quality: 0.0,
            ..DownloadConfig::default()
        };
        let big = DownloadConfig {
            jpg_quality: 3.0,
            ..DownloadConfig::default()
        };
        let nan = DownloadConfig {
            jpg_quality: f32::NAN,
            ..DownloadConfig::default()
        };

        assert!((zero.normalized().jpg_quality - 0.9).abs() < f32::EPSILON);
        assert!((big.normalized().jpg_quality - 1.0).abs() < f32::EPSILON);
        assert!((nan.normalized().jpg_quality - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn format_policy_targets() {
        assert_eq!(FormatPolicy::Original.target(), None);
        assert_eq!(FormatPolicy::Png.target(), Some(TargetFormat::Png));
        assert_eq!(FormatPolicy::Jpg.target(), Some(TargetFormat::Jpg));
    }

    #[test]
    fn empty_service_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download_dir(), &PathBuf::from("downloads"));
        assert_eq!(config.network.fetch_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.storage.blob_release_delay, Duration::from_secs(10));
        assert_eq!(config.event_buffer, 1000);
        assert!(config.server.api.cors_enabled);
    }
}
