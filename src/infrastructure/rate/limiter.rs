//! Token-bucket admission gate.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::domain::errors::{MdexError, MdexResult};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Bounds calls to a family of endpoints to `rate` per second with bursts
/// of up to `burst` calls. Tokens refill continuously.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    rate: f64,
    burst: f64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a full bucket. Rate and burst are clamped to be positive.
    #[must_use]
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            rate: rate_per_sec.max(f64::EPSILON),
            burst,
        }
    }

    /// Creates a limiter allowing `requests` per minute.
    #[must_use]
    pub fn per_minute(requests: u32, burst: u32) -> Self {
        Self::new(f64::from(requests) / 60.0, burst)
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_refill = now;
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Waits for a token and consumes it.
    ///
    /// # Errors
    /// Returns [`MdexError::Cancelled`] if `cancel` fires first. No token is
    /// consumed in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> MdexResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(MdexError::Cancelled);
            }

            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket, Instant::now());
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };

            trace!(wait_ms = wait.as_millis(), "Waiting for rate limit token");

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(MdexError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(1.0, 5);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire(&cancel).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_beyond_burst_are_paced() {
        let limiter = RateLimiter::new(10.0, 2);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..7 {
            limiter.acquire(&cancel).await.unwrap();
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_consumes_nothing() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = limiter.acquire(&cancel).await;
        assert!(matches!(result, Err(MdexError::Cancelled)));

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let limiter = RateLimiter::new(1.0, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            limiter.acquire(&cancel).await,
            Err(MdexError::Cancelled)
        ));
        assert!(limiter.available() >= 1.0);
    }

    #[test]
    fn test_per_minute_rate() {
        let limiter = RateLimiter::per_minute(40, 40);
        assert!((limiter.rate - 40.0 / 60.0).abs() < f64::EPSILON);
        assert!((limiter.burst - 40.0).abs() < f64::EPSILON);
    }
}
