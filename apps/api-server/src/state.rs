//! Application state - shared across all handlers.

use std::net::IpAddr;
use std::sync::Arc;

use tradelog_core::ports::{Cache, Clock, RateLimiter, TokenService};
use tradelog_core::rate_limit::{FailureMode, RateLimitPresets};
use tradelog_infra::{CacheRateLimiter, InMemoryCache, JwtTokenService, SystemClock};

use crate::config::{AppConfig, ConfigError, LimiterBackend, RateLimitSettings};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimiter>,
    pub backend: LimiterBackend,
    pub failure_mode: FailureMode,
    pub presets: RateLimitPresets,
    pub trusted_proxies: Arc<[IpAddr]>,
    pub tokens: Arc<dyn TokenService>,
    /// Set when rate limit state is held in process and needs sweeping.
    pub memory_cache: Option<Arc<InMemoryCache>>,
}

impl AppState {
    /// Build the application state with the configured limiter backend.
    pub async fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let settings = &config.rate_limit;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

        let (limiter, backend, memory_cache) = match settings.backend {
            LimiterBackend::Memory => {
                let (limiter, cache) = memory_limiter(settings, clock);
                (limiter, LimiterBackend::Memory, Some(cache))
            }
            backend => redis_limiter(settings, clock, backend).await?,
        };

        tracing::info!(
            backend = backend.as_str(),
            failure_mode = settings.failure_mode.as_str(),
            trusted_proxies = settings.trusted_proxies.len(),
            "Application state initialized"
        );

        Ok(Self {
            limiter,
            backend,
            failure_mode: settings.failure_mode,
            presets: settings.presets.clone(),
            trusted_proxies: Arc::from(settings.trusted_proxies.as_slice()),
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
            memory_cache,
        })
    }
}

fn memory_limiter(
    settings: &RateLimitSettings,
    clock: Arc<dyn Clock>,
) -> (Arc<dyn RateLimiter>, Arc<InMemoryCache>) {
    let cache = Arc::new(InMemoryCache::new());
    let shared: Arc<dyn Cache> = cache.clone();
    (cache_limiter(settings, shared, clock), cache)
}

fn cache_limiter(
    settings: &RateLimitSettings,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
) -> Arc<dyn RateLimiter> {
    Arc::new(CacheRateLimiter::new(cache, clock).with_key_prefix(settings.key_prefix.clone()))
}

type LimiterParts = (
    Arc<dyn RateLimiter>,
    LimiterBackend,
    Option<Arc<InMemoryCache>>,
);

#[cfg(feature = "redis")]
async fn redis_limiter(
    settings: &RateLimitSettings,
    clock: Arc<dyn Clock>,
    backend: LimiterBackend,
) -> Result<LimiterParts, ConfigError> {
    use tradelog_infra::{RedisCache, RedisRateLimitConfig, RedisRateLimiter};

    let connected: Result<Arc<dyn RateLimiter>, String> = match backend {
        LimiterBackend::RedisCache => match RedisCache::new(settings.redis.clone()).await {
            Ok(cache) => {
                tracing::warn!(
                    "redis-cache backend serializes checks per instance only; \
                     use the redis backend when several instances share limits"
                );
                Ok(cache_limiter(settings, Arc::new(cache), clock.clone()))
            }
            Err(e) => Err(e.to_string()),
        },
        _ => {
            let config = RedisRateLimitConfig {
                redis: settings.redis.clone(),
                key_prefix: settings.key_prefix.clone(),
            };
            match RedisRateLimiter::new(config, clock.clone()).await {
                Ok(limiter) => Ok(Arc::new(limiter) as Arc<dyn RateLimiter>),
                Err(e) => Err(e.to_string()),
            }
        }
    };

    match connected {
        Ok(limiter) => Ok((limiter, backend, None)),
        Err(e) if settings.redis.fallback_to_memory => {
            tracing::error!(
                "Failed to connect to Redis rate limiter: {}. Using in-memory fallback.",
                e
            );
            let (limiter, cache) = memory_limiter(settings, clock);
            Ok((limiter, LimiterBackend::Memory, Some(cache)))
        }
        Err(e) => Err(ConfigError::Backend(e)),
    }
}

#[cfg(not(feature = "redis"))]
async fn redis_limiter(
    _settings: &RateLimitSettings,
    _clock: Arc<dyn Clock>,
    backend: LimiterBackend,
) -> Result<LimiterParts, ConfigError> {
    Err(ConfigError::Backend(format!(
        "{} backend needs the redis feature",
        backend.as_str()
    )))
}
