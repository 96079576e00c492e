//! Sharded, time-bounded response cache.
//!
//! Entries expire after a fixed TTL and each shard holds at most its slice
//! of the total memory budget. When a shard is full the oldest entries are
//! dropped to admit new writes, whether or not they have expired yet.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::key::CacheKey;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Construction parameters are unusable.
    #[error("invalid cache config: {0}")]
    InvalidConfig(String),
    /// The cache has been shut down.
    #[error("cache is shut down")]
    Closed,
}

/// What happened to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The entry is now readable.
    Stored,
    /// The entry was too large and was not stored. The next read misses.
    Rejected,
}

/// Construction-time cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of an entry.
    pub ttl: Duration,
    /// Interval of the background sweep. Zero disables the sweeper.
    pub clean_interval: Duration,
    /// Number of shards. Must be a power of two.
    pub shards: usize,
    /// Largest body accepted, in bytes. Must fit in one shard's share of
    /// `hard_max_bytes`.
    pub max_entry_size: usize,
    /// Total memory ceiling across all shards, in bytes.
    pub hard_max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            clean_interval: Duration::from_secs(5 * 60),
            shards: 256,
            max_entry_size: 1024 * 1024,
            hard_max_bytes: 450 * 1024 * 1024,
        }
    }
}

struct Entry {
    bytes: Bytes,
    stored_at: Instant,
}

impl Entry {
    fn cost(key: &CacheKey, bytes: &Bytes) -> usize {
        key.len() + bytes.len()
    }
}

/// One lock domain. Reads use `peek`, so the LRU order is insertion order
/// and `pop_lru` always yields the oldest entry.
struct Shard {
    entries: LruCache<CacheKey, Entry>,
    used: usize,
}

impl Shard {
    fn remove(&mut self, key: &CacheKey) {
        if let Some(old) = self.entries.pop(key) {
            self.used -= Entry::cost(key, &old.bytes);
        }
    }

    fn pop_oldest(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((key, old)) => {
                self.used -= Entry::cost(&key, &old.bytes);
                true
            }
            None => false,
        }
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired entries.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Writes refused for size.
    pub rejected: u64,
    /// Live entries, expired ones included until swept.
    pub entries: usize,
    /// Bytes accounted against the budget.
    pub used_bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {} bytes ({} hits, {} misses, {} evicted, {} rejected)",
            self.entries, self.used_bytes, self.hits, self.misses, self.evictions, self.rejected
        )
    }
}

/// Shared key to bytes store, safe for concurrent use without external locking.
pub struct ResponseCache {
    shards: Box<[Mutex<Shard>]>,
    config: CacheConfig,
    shard_budget: usize,
    closed: AtomicBool,
    shutdown: CancellationToken,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    rejected: AtomicU64,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Creates a cache with the given configuration.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidConfig`] if the shard count is not a power
    /// of two or one shard's share of the budget cannot hold a body of
    /// `max_entry_size` bytes.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        if !config.shards.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "shard count {} is not a power of two",
                config.shards
            )));
        }

        let shard_budget = config.hard_max_bytes / config.shards;
        if shard_budget == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "{} bytes cannot be split across {} shards",
                config.hard_max_bytes, config.shards
            )));
        }
        if config.max_entry_size > shard_budget {
            return Err(CacheError::InvalidConfig(format!(
                "max entry size {} exceeds the {shard_budget} byte budget of a shard",
                config.max_entry_size
            )));
        }

        let shards = (0..config.shards)
            .map(|_| {
                Mutex::new(Shard {
                    entries: LruCache::unbounded(),
                    used: 0,
                })
            })
            .collect();

        Ok(Self {
            shards,
            config,
            shard_budget,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// Returns the configuration the cache was built with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() as usize) & (self.shards.len() - 1);
        &self.shards[index]
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.stored_at) >= self.config.ttl
    }

    /// Returns the cached bytes if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = Instant::now();
        let mut shard = self.shard(key).lock();

        let fresh = shard
            .entries
            .peek(key)
            .map(|entry| (!self.is_expired(entry, now)).then(|| entry.bytes.clone()));
        let hit = match fresh {
            Some(Some(bytes)) => Some(bytes),
            Some(None) => {
                shard.remove(key);
                None
            }
            None => None,
        };
        drop(shard);

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Response cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Response cache miss");
        }
        hit
    }

    /// Stores `bytes` under `key`, replacing any previous entry atomically.
    ///
    /// Bodies larger than the configured entry size are refused with
    /// [`StoreOutcome::Rejected`] rather than an error.
    ///
    /// # Errors
    /// Returns [`CacheError::Closed`] after [`ResponseCache::shutdown`].
    pub fn set(&self, key: CacheKey, bytes: Bytes) -> CacheResult<StoreOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }

        let cost = Entry::cost(&key, &bytes);
        if bytes.len() > self.config.max_entry_size || cost > self.shard_budget {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                key = %key,
                size = bytes.len(),
                max = self.config.max_entry_size,
                "Entry too large for cache"
            );
            return Ok(StoreOutcome::Rejected);
        }

        let mut shard = self.shard(&key).lock();
        shard.remove(&key);

        let mut evicted = 0u64;
        while shard.used + cost > self.shard_budget && shard.pop_oldest() {
            evicted += 1;
        }

        shard.used += cost;
        shard.entries.put(
            key,
            Entry {
                bytes,
                stored_at: Instant::now(),
            },
        );
        drop(shard);

        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, "Evicted oldest entries to admit write");
        }
        Ok(StoreOutcome::Stored)
    }

    /// Removes every expired entry. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            while shard
                .entries
                .peek_lru()
                .is_some_and(|(_, entry)| self.is_expired(entry, now))
            {
                shard.pop_oldest();
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Starts the background sweep. The task ends on shutdown or when the
    /// cache is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.clean_interval;
        if interval.is_zero() {
            return None;
        }

        let cache: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        cache.sweep();
                    }
                }
            }
            debug!("Cache sweeper stopped");
        }))
    }

    /// Stops the sweeper, drops every entry, and refuses further writes.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();
        for shard in &self.shards {
            let mut shard = shard.lock();
            shard.entries.clear();
            shard.used = 0;
        }
        debug!("Response cache shut down");
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (entries, used_bytes) = self.shards.iter().fold((0, 0), |(n, b), shard| {
            let shard = shard.lock();
            (n + shard.entries.len(), b + shard.used)
        });
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            entries,
            used_bytes,
        }
    }
}
