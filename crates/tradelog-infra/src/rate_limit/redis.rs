//! Redis rate limiter: the sliding window as one atomic Lua script.

use std::sync::Arc;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use tradelog_core::ports::{Clock, RateLimitError, RateLimiter};
use tradelog_core::rate_limit::{Admission, RateLimitPolicy};

use super::DEFAULT_KEY_PREFIX;
use crate::cache::RedisConfig;

/// Prune, count, and record in one round trip. Scores are arrival times in
/// epoch ms; ZREMRANGEBYSCORE's bounds are inclusive, so an entry exactly
/// one window old is dropped.
///
/// Returns `{admitted (0|1), count, oldest}`.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)

local count = redis.call('ZCARD', key)
if count >= max_requests then
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    return {0, count, tonumber(oldest[2])}
end

redis.call('ZADD', key, now, member)
redis.call('PEXPIRE', key, window)

local first = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
return {1, count + 1, tonumber(first[2])}
"#;

/// Redis rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RedisRateLimitConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
}

impl Default for RedisRateLimitConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl RedisRateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string()),
        }
    }
}

/// Redis-backed sliding-window limiter.
///
/// The whole check runs inside Redis, so concurrent requests for one key
/// are serialized even across server instances.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    config: RedisRateLimitConfig,
    clock: Arc<dyn Clock>,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(
        config: RedisRateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        let conn = config.redis.connect().await?;

        tracing::info!(url = %config.redis.url, "Connected to Redis rate limiter");

        Ok(Self {
            conn,
            config,
            clock,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, policy: &RateLimitPolicy) -> Result<Admission, RateLimitError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();
        let now = self.clock.now_millis();

        // Two hits in the same millisecond must stay distinct members.
        let member = format!("{}-{}", now, Uuid::new_v4());

        let reply: Vec<i64> = self
            .script
            .key(&redis_key)
            .arg(now)
            .arg(policy.window_millis())
            .arg(policy.max_requests())
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        let [admitted, count, oldest] = reply[..] else {
            return Err(RateLimitError::CorruptState {
                key: redis_key,
                reason: format!("unexpected script reply: {reply:?}"),
            });
        };

        let admission = if admitted == 1 {
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            Admission::allowed(policy, count, oldest, now)
        } else {
            Admission::denied(policy, oldest, now)
        };

        if !admission.is_allowed() {
            tracing::debug!(key = %redis_key, policy = policy.name(), "Rate limit denied");
        }

        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::MockClock;

    async fn get_test_ratelimiter(clock: MockClock) -> Option<RedisRateLimiter> {
        let config = RedisRateLimitConfig {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
                connect_timeout: Duration::from_secs(1),
                fallback_to_memory: false,
            },
            key_prefix: format!("test_ratelimit:{}", Uuid::new_v4()),
        };

        RedisRateLimiter::new(config, Arc::new(clock)).await.ok()
    }

    #[tokio::test]
    async fn test_redis_sliding_window() {
        let clock = MockClock::new(1_700_000_000_000);
        let limiter = match get_test_ratelimiter(clock.clone()).await {
            Some(l) => l,
            None => return,
        };
        let policy = RateLimitPolicy::new("test", Duration::from_secs(60), 3).unwrap();
        let start = clock.now_millis();

        for offset in [0, 10, 20] {
            clock.set(start + offset);
            assert!(limiter.hit("K", &policy).await.unwrap().is_allowed());
        }

        clock.set(start + 30);
        match limiter.hit("K", &policy).await.unwrap() {
            Admission::Denied {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, 60),
            other => panic!("expected denial, got {other:?}"),
        }

        clock.set(start + 60_001);
        match limiter.hit("K", &policy).await.unwrap() {
            Admission::Allowed { remaining, .. } => assert_eq!(remaining, 0),
            other => panic!("expected admission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redis_same_millisecond_hits_are_counted() {
        let clock = MockClock::new(1_700_000_000_000);
        let limiter = match get_test_ratelimiter(clock).await {
            Some(l) => l,
            None => return,
        };
        let policy = RateLimitPolicy::new("test", Duration::from_secs(1), 2).unwrap();

        assert!(limiter.hit("same-ms", &policy).await.unwrap().is_allowed());
        assert!(limiter.hit("same-ms", &policy).await.unwrap().is_allowed());
        assert!(!limiter.hit("same-ms", &policy).await.unwrap().is_allowed());
    }
}
