//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use tradelog_core::PolicyError;
use tradelog_core::rate_limit::{FailureMode, Preset, PresetLimits, RateLimitPresets};
use tradelog_infra::JwtConfig;

#[cfg(feature = "redis")]
use tradelog_infra::RedisConfig;

/// Startup configuration errors. Any of these aborts the server.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    #[error("Invalid rate limit policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Rate limiter backend unavailable: {0}")]
    Backend(String),
}

/// Where rate limit state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterBackend {
    /// Per-process state; limits are not shared across instances.
    Memory,
    /// Shared state in Redis, checked atomically.
    Redis,
    /// Window logs stored as plain Redis values. Checks are serialized per
    /// key within one instance only.
    RedisCache,
}

impl LimiterBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterBackend::Memory => "memory",
            LimiterBackend::Redis => "redis",
            LimiterBackend::RedisCache => "redis-cache",
        }
    }
}

impl FromStr for LimiterBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(LimiterBackend::Memory),
            "redis" => Ok(LimiterBackend::Redis),
            "redis-cache" => Ok(LimiterBackend::RedisCache),
            _ => Err(()),
        }
    }
}

/// Rate limiting settings.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub backend: LimiterBackend,
    pub failure_mode: FailureMode,
    pub key_prefix: String,
    pub presets: RateLimitPresets,
    /// Reverse proxies allowed to name the client in forwarding headers.
    pub trusted_proxies: Vec<IpAddr>,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitSettings,
    pub jwt: JwtConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT")?.unwrap_or(8080),
            rate_limit: RateLimitSettings::from_env()?,
            jwt: JwtConfig::from_env(),
        })
    }
}

impl RateLimitSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("RATE_LIMIT_BACKEND") {
            Ok(value) => value
                .parse()
                .map_err(|_| invalid("RATE_LIMIT_BACKEND", &value))?,
            Err(_) => LimiterBackend::Memory,
        };

        let failure_mode = match env::var("RATE_LIMIT_FAILURE_MODE") {
            Ok(value) => FailureMode::parse(&value)
                .ok_or_else(|| invalid("RATE_LIMIT_FAILURE_MODE", &value))?,
            Err(_) => FailureMode::default(),
        };

        let mut limits = HashMap::new();
        for preset in Preset::ALL {
            limits.insert(preset, preset_limits_from_env(preset)?);
        }
        let presets = RateLimitPresets::from_limits(|preset| {
            limits.get(&preset).copied().unwrap_or(preset.defaults())
        })?;

        Ok(Self {
            backend,
            failure_mode,
            key_prefix: env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| tradelog_infra::rate_limit::DEFAULT_KEY_PREFIX.to_string()),
            presets,
            trusted_proxies: match env::var("RATE_LIMIT_TRUSTED_PROXIES") {
                Ok(value) => parse_ip_list(&value)
                    .ok_or_else(|| invalid("RATE_LIMIT_TRUSTED_PROXIES", &value))?,
                Err(_) => Vec::new(),
            },
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
        })
    }
}

/// `RATE_LIMIT_<PRESET>_MAX_REQUESTS` / `RATE_LIMIT_<PRESET>_WINDOW_SECS`,
/// falling back to the preset's defaults.
fn preset_limits_from_env(preset: Preset) -> Result<PresetLimits, ConfigError> {
    let defaults = preset.defaults();
    let prefix = format!("RATE_LIMIT_{}", preset.name().to_ascii_uppercase());

    let max_requests = parse_var(&format!("{prefix}_MAX_REQUESTS"))?.unwrap_or(defaults.max_requests);
    let window = parse_var::<u64>(&format!("{prefix}_WINDOW_SECS"))?
        .map(Duration::from_secs)
        .unwrap_or(defaults.window);

    Ok(PresetLimits {
        window,
        max_requests,
    })
}

/// Unset is `Ok(None)`; set but unparsable is an error.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, &value)),
        Err(_) => Ok(None),
    }
}

/// Comma-separated IP addresses; blank entries are ignored.
fn parse_ip_list(value: &str) -> Option<Vec<IpAddr>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.parse().ok())
        .collect()
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("memory".parse(), Ok(LimiterBackend::Memory));
        assert_eq!(" Redis ".parse(), Ok(LimiterBackend::Redis));
        assert_eq!("redis-cache".parse(), Ok(LimiterBackend::RedisCache));
        assert!("postgres".parse::<LimiterBackend>().is_err());
    }

    #[test]
    fn test_unset_preset_uses_defaults() {
        // No test sets this preset's variables.
        let limits = preset_limits_from_env(Preset::Sensitive).unwrap();
        assert_eq!(limits, Preset::Sensitive.defaults());
    }

    #[test]
    fn test_invalid_error_message() {
        let err = invalid("PORT", "eighty");
        assert_eq!(err.to_string(), "Invalid value for PORT: 'eighty'");
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let proxies = parse_ip_list("10.0.0.2, ::1,").unwrap();
        assert_eq!(
            proxies,
            vec!["10.0.0.2".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert_eq!(parse_ip_list(""), Some(vec![]));
        assert!(parse_ip_list("10.0.0.2, proxy.internal").is_none());
    }
}
