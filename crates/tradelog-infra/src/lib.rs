//! # Tradelog Infrastructure
//!
//! Concrete implementations of the ports defined in `tradelog-core`.
//! This crate contains the caches, rate limiter backends, clocks and the
//! token service.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `auth` - JWT token service
//! - `redis` - Redis support for the cache and the atomic rate limiter
//! - `test-helpers` - Exposes `MockClock` outside this crate's tests

pub mod cache;
pub mod clock;
pub mod rate_limit;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use cache::InMemoryCache;
pub use clock::SystemClock;
pub use rate_limit::CacheRateLimiter;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::MockClock;

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisConfig};
#[cfg(feature = "redis")]
pub use rate_limit::{RedisRateLimitConfig, RedisRateLimiter};
