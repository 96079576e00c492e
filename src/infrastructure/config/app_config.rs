//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::domain::entities::PackageFormat;
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::http::DEFAULT_TIMEOUT;
use crate::infrastructure::image::DEFAULT_CONCURRENCY;
use crate::infrastructure::mangadex::GatewayOptions;
use crate::infrastructure::rate::RateLimiter;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, loaded from `config.toml` and overlaid with
/// command line flags.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Preferred language for titles and chapter translations.
    #[serde(default = "default_language")]
    pub language: String,

    /// Download the compressed image set.
    #[serde(default)]
    pub data_saver: bool,

    /// Download images from the uploads host instead of an assigned node.
    #[serde(default)]
    pub md_uploads: bool,

    /// Use the development API.
    #[serde(default)]
    pub dev_api: bool,

    /// Skip image downloads; packages get empty image entries.
    #[serde(default)]
    pub no_download: bool,

    /// Default package format.
    #[serde(default)]
    pub format: PackageFormat,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Image download settings.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Image-location admission rate.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_clean_interval_secs")]
    pub clean_interval_secs: u64,

    /// Power of two.
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Largest cacheable body in bytes. Must fit one shard's share of `hard_max_bytes`.
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,

    /// Memory ceiling in bytes across all shards.
    #[serde(default = "default_hard_max_bytes")]
    pub hard_max_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            clean_interval_secs: default_clean_interval_secs(),
            shards: default_shards(),
            max_entry_size: default_max_entry_size(),
            hard_max_bytes: default_hard_max_bytes(),
        }
    }
}

impl CacheSettings {
    /// Converts to the cache's own configuration.
    #[must_use]
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            clean_interval: Duration::from_secs(self.clean_interval_secs),
            shards: self.shards,
            max_entry_size: self.max_entry_size,
            hard_max_bytes: self.hard_max_bytes,
        }
    }
}

/// Image download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Concurrent image downloads per chapter.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchSettings {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Admission rate of the image-location endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Sustained admissions per minute.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Admissions allowed back to back.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
        }
    }
}

impl RateLimitSettings {
    /// Builds a limiter with these settings.
    #[must_use]
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::per_minute(self.requests_per_minute, self.burst)
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_clean_interval_secs() -> u64 {
    300
}

fn default_shards() -> usize {
    256
}

fn default_max_entry_size() -> usize {
    1024 * 1024
}

fn default_hard_max_bytes() -> usize {
    450 * 1024 * 1024
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_requests_per_minute() -> u32 {
    40
}

fn default_burst() -> u32 {
    40
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(language) = &args.language {
            self.language.clone_from(language);
        }
        if let Some(data_saver) = args.data_saver {
            self.data_saver = data_saver;
        }
        if let Some(md_uploads) = args.md_uploads {
            self.md_uploads = md_uploads;
        }
        if let Some(dev_api) = args.dev_api {
            self.dev_api = dev_api;
        }
        if let Some(no_download) = args.no_download {
            self.no_download = no_download;
        }
        if let Some(concurrency) = args.concurrency {
            self.fetch.concurrency = concurrency;
        }
    }

    /// Gateway switches derived from this configuration.
    #[must_use]
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            dev_api: self.dev_api,
            no_download: self.no_download,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            language: default_language(),
            data_saver: false,
            md_uploads: false,
            dev_api: false,
            no_download: false,
            format: PackageFormat::default(),
            cache: CacheSettings::default(),
            fetch: FetchSettings::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}
