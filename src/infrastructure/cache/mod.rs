//! In-memory response caching.
//!
//! This module provides:
//! - Canonical request keys independent of parameter order
//! - A sharded TTL cache with a hard memory ceiling

pub mod key;
pub mod response_cache;

pub use key::{CacheKey, QueryParams};
pub use response_cache::{
    CacheConfig, CacheError, CacheResult, CacheStats, ResponseCache, StoreOutcome,
};
