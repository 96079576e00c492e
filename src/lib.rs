//! mdex-pack - MangaDex chapter downloader and packager.
//!
//! This crate fetches chapter metadata through a cached, rate-limited API
//! gateway, downloads page images with bounded concurrency, and streams them
//! into CBZ or EPUB archives.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "mdex-pack";
