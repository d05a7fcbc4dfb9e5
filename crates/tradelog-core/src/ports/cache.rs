use async_trait::async_trait;
use std::time::Duration;

/// Shared expiring key-value cache (Redis, in-memory).
///
/// Errors are returned to the caller rather than read as a miss, so a
/// limiter can tell "no history" apart from "cache down".
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value with optional TTL. Overwrites and resets the TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
}

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
