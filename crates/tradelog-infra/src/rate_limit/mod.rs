//! Sliding-window rate limiter backends.

mod cache_backed;

pub use cache_backed::CacheRateLimiter;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisRateLimitConfig, RedisRateLimiter};

/// Prefix applied to every rate limit key in the shared cache.
pub const DEFAULT_KEY_PREFIX: &str = "ratelimit";
