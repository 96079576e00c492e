//! Outbound rate control.

pub mod limiter;

pub use limiter::RateLimiter;
