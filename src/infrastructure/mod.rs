//! Infrastructure layer with external service adapters.

/// Package archive assembly.
pub mod archive;
/// In-memory response cache.
pub mod cache;
/// Application configuration.
pub mod config;
/// HTTP transport.
pub mod http;
/// Page image downloads.
pub mod image;
/// MangaDex API gateway and endpoints.
pub mod mangadex;
/// Token-bucket rate limiting.
pub mod rate;
/// Built-in document renderer.
pub mod templates;

pub use archive::{ArchiveAssembler, AssemblerState, assemble};
pub use cache::{CacheConfig, CacheKey, QueryParams, ResponseCache};
pub use config::{AppConfig, CliArgs, Command, ConfigStore, LogLevel};
pub use http::ReqwestTransport;
pub use image::ImageFetcher;
pub use mangadex::{ApiGateway, GatewayOptions, MangaDexClient};
pub use rate::RateLimiter;
pub use templates::BuiltinRenderer;
