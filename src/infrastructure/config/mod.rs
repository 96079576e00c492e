//! Application configuration.

pub mod app_config;
pub mod args;
pub mod store;

pub use app_config::{AppConfig, CacheSettings, FetchSettings, LogLevel, RateLimitSettings};
pub use args::{CliArgs, Command};
pub use store::{ConfigError, ConfigStore};
