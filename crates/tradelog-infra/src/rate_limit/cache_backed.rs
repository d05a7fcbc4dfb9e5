//! Sliding-window limiter over any [`Cache`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use tradelog_core::ports::{Cache, CacheError, Clock, RateLimitError, RateLimiter};
use tradelog_core::rate_limit::{Admission, RateLimitPolicy, WindowLog};

use super::DEFAULT_KEY_PREFIX;

/// Rate limiter that keeps each key's [`WindowLog`] in a shared cache.
///
/// Each check is one `get` and, when admitted, one `set` with TTL equal to
/// the policy window. Checks for the same key are serialized through a
/// per-key mutex, so concurrent requests in this process cannot both read
/// the same stale log. Different keys never wait on each other.
///
/// The mutex does not span processes: several instances sharing one Redis
/// should use [`crate::RedisRateLimiter`] instead.
pub struct CacheRateLimiter {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheRateLimiter {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            locks: DashMap::new(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn lock_for(&self, cache_key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(cache_key.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop the key's mutex once nobody else holds or waits on it.
    fn release_lock(&self, cache_key: &str) {
        self.locks
            .remove_if(cache_key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of keys with a check in flight.
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }

    async fn hit_locked(
        &self,
        cache_key: &str,
        policy: &RateLimitPolicy,
    ) -> Result<Admission, RateLimitError> {
        let now = self.clock.now_millis();

        let mut log = match self.cache.get(cache_key).await? {
            Some(raw) => {
                WindowLog::from_json(&raw).map_err(|e| RateLimitError::CorruptState {
                    key: cache_key.to_string(),
                    reason: e.to_string(),
                })?
            }
            None => WindowLog::new(),
        };

        let admission = log.admit(now, policy);

        if let Admission::Allowed { .. } = admission {
            let raw = log
                .to_json()
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            self.cache
                .set(cache_key, &raw, Some(policy.window()))
                .await?;
        }

        Ok(admission)
    }
}

#[async_trait]
impl RateLimiter for CacheRateLimiter {
    async fn hit(&self, key: &str, policy: &RateLimitPolicy) -> Result<Admission, RateLimitError> {
        let cache_key = self.make_key(key);
        let lock = self.lock_for(&cache_key);

        let result = {
            let _guard = lock.lock().await;
            self.hit_locked(&cache_key, policy).await
        };

        drop(lock);
        self.release_lock(&cache_key);

        match &result {
            Ok(Admission::Denied {
                retry_after_secs, ..
            }) => {
                tracing::debug!(
                    key = %cache_key,
                    policy = policy.name(),
                    retry_after_secs,
                    "Rate limit denied"
                );
            }
            Ok(Admission::Allowed { remaining, .. }) => {
                tracing::debug!(key = %cache_key, policy = policy.name(), remaining, "Rate limit admitted");
            }
            Ok(Admission::Exempt) => {}
            Err(e) => {
                tracing::warn!(key = %cache_key, policy = policy.name(), error = %e, "Rate limit check failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tradelog_core::rate_limit::RequestIdentity;

    use crate::cache::InMemoryCache;
    use crate::clock::MockClock;

    fn limiter_at(start: i64) -> (CacheRateLimiter, MockClock, Arc<InMemoryCache>) {
        let clock = MockClock::new(start);
        let cache = Arc::new(InMemoryCache::new());
        let limiter = CacheRateLimiter::new(cache.clone(), Arc::new(clock.clone()));
        (limiter, clock, cache)
    }

    fn policy(window: Duration, max: u32) -> RateLimitPolicy {
        RateLimitPolicy::new("test", window, max).unwrap()
    }

    #[tokio::test]
    async fn test_scenarios_a_and_b() {
        let (limiter, clock, cache) = limiter_at(0);
        let policy = policy(Duration::from_secs(60), 3);

        for t in [0, 10, 20] {
            clock.set(t);
            assert!(limiter.hit("K", &policy).await.unwrap().is_allowed());
        }

        clock.set(30);
        match limiter.hit("K", &policy).await.unwrap() {
            Admission::Denied {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, 60),
            other => panic!("expected denial, got {other:?}"),
        }

        clock.set(60_001);
        assert!(limiter.hit("K", &policy).await.unwrap().is_allowed());

        let stored = cache.get("ratelimit:K").await.unwrap().unwrap();
        assert_eq!(
            WindowLog::from_json(&stored).unwrap().timestamps(),
            &[10, 20, 60_001]
        );
    }

    #[tokio::test]
    async fn test_scenario_c_keys_are_independent() {
        let (limiter, _clock, _cache) = limiter_at(1_000);
        let policy = policy(Duration::from_secs(60), 2);

        for _ in 0..2 {
            assert!(limiter.hit("A", &policy).await.unwrap().is_allowed());
        }
        assert!(!limiter.hit("A", &policy).await.unwrap().is_allowed());

        for _ in 0..2 {
            assert!(limiter.hit("B", &policy).await.unwrap().is_allowed());
        }
    }

    #[tokio::test]
    async fn test_scenario_d_skip_writes_nothing() {
        let (limiter, _clock, cache) = limiter_at(0);
        let policy = policy(Duration::from_secs(60), 1).skip_if(|r| r.ip.as_deref() == Some("10.0.0.1"));
        let request = RequestIdentity::new("GET", "/api/health").with_ip("10.0.0.1");

        for _ in 0..1000 {
            assert_eq!(
                limiter.check(&request, &policy).await.unwrap(),
                Admission::Exempt
            );
        }
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_denial_leaves_stored_log_untouched() {
        let (limiter, clock, cache) = limiter_at(0);
        let policy = policy(Duration::from_secs(10), 1);

        limiter.hit("K", &policy).await.unwrap();
        clock.set(5_000);
        assert!(!limiter.hit("K", &policy).await.unwrap().is_allowed());

        let stored = cache.get("ratelimit:K").await.unwrap().unwrap();
        assert_eq!(stored, "[0]");
    }

    #[tokio::test]
    async fn test_key_prefix() {
        let (limiter, _clock, cache) = limiter_at(0);
        let limiter = limiter.with_key_prefix("rl:test");
        limiter
            .hit("K", &policy(Duration::from_secs(1), 1))
            .await
            .unwrap();

        assert!(cache.get("rl:test:K").await.unwrap().is_some());
        assert!(cache.get("ratelimit:K").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error() {
        let (limiter, _clock, cache) = limiter_at(0);
        cache.set("ratelimit:K", "not json", None).await.unwrap();

        let err = limiter
            .hit("K", &policy(Duration::from_secs(1), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::CorruptState { .. }));
    }

    struct FailingCache;

    #[async_trait]
    impl Cache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cache_failure_propagates() {
        let limiter = CacheRateLimiter::new(Arc::new(FailingCache), Arc::new(MockClock::new(0)));
        let err = limiter
            .hit("K", &policy(Duration::from_secs(1), 1))
            .await
            .unwrap_err();

        assert!(matches!(err, RateLimitError::Cache(CacheError::Connection(_))));
        assert_eq!(limiter.active_keys(), 0);
    }

    /// Yields between every cache call so racing checks interleave.
    struct YieldingCache(InMemoryCache);

    #[async_trait]
    impl Cache for YieldingCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            tokio::task::yield_now().await;
            let value = self.0.get(key).await;
            tokio::task::yield_now().await;
            value
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            tokio::task::yield_now().await;
            self.0.set(key, value, ttl).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_never_over_admit() {
        let limiter = Arc::new(CacheRateLimiter::new(
            Arc::new(YieldingCache(InMemoryCache::new())),
            Arc::new(MockClock::new(0)),
        ));
        let policy = Arc::new(policy(Duration::from_secs(60), 10));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let policy = Arc::clone(&policy);
                tokio::spawn(async move { limiter.hit("hot", &policy).await.unwrap() })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_allowed() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 10);
        assert_eq!(limiter.active_keys(), 0);
    }
}
