//! Page image downloads.

pub mod fetcher;

pub use fetcher::{DEFAULT_CONCURRENCY, ImageFetcher};
