//! Rate limiting port.

use async_trait::async_trait;

use super::cache::CacheError;
use crate::rate_limit::{Admission, RateLimitPolicy, RequestIdentity};

/// Rate limiter trait - abstraction over sliding-window backends.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key` under `policy`.
    ///
    /// A denied request is not recorded.
    async fn hit(&self, key: &str, policy: &RateLimitPolicy) -> Result<Admission, RateLimitError>;

    /// Full admission check for a request: skip predicate first, then key
    /// derivation, then [`RateLimiter::hit`].
    async fn check(
        &self,
        request: &RequestIdentity,
        policy: &RateLimitPolicy,
    ) -> Result<Admission, RateLimitError> {
        if policy.should_skip(request) {
            return Ok(Admission::Exempt);
        }
        let key = policy.key_for(request);
        self.hit(&key, policy).await
    }
}

/// Rate limit errors. A denial is not an error.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Corrupt rate limit state for '{key}': {reason}")]
    CorruptState { key: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records which keys reached the backend.
    #[derive(Default)]
    struct RecordingLimiter {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RateLimiter for RecordingLimiter {
        async fn hit(
            &self,
            key: &str,
            policy: &RateLimitPolicy,
        ) -> Result<Admission, RateLimitError> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(Admission::Allowed {
                limit: policy.max_requests(),
                remaining: 0,
                reset_after: policy.window(),
            })
        }
    }

    #[tokio::test]
    async fn test_check_derives_default_key() {
        let limiter = RecordingLimiter::default();
        let policy = RateLimitPolicy::new("api", Duration::from_secs(60), 1).unwrap();
        let request = RequestIdentity::new("GET", "/api/limits").with_ip("192.0.2.1");

        limiter.check(&request, &policy).await.unwrap();

        assert_eq!(
            *limiter.keys.lock().unwrap(),
            vec!["GET:/api/limits:anonymous:192.0.2.1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_skipped_request_never_reaches_backend() {
        let limiter = RecordingLimiter::default();
        let policy = RateLimitPolicy::new("api", Duration::from_secs(60), 1)
            .unwrap()
            .skip_if(|r| r.ip.as_deref() == Some("10.0.0.1"));
        let request = RequestIdentity::new("GET", "/api/health").with_ip("10.0.0.1");

        for _ in 0..1000 {
            let admission = limiter.check(&request, &policy).await.unwrap();
            assert_eq!(admission, Admission::Exempt);
        }
        assert!(limiter.keys.lock().unwrap().is_empty());
    }
}
