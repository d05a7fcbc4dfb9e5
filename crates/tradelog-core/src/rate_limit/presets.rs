//! Built-in policy presets for the route groups the API exposes.

use std::time::Duration;

use super::policy::RateLimitPolicy;
use crate::error::PolicyError;

/// Route groups that get their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Login, registration, token refresh.
    Auth,
    /// General API traffic.
    Api,
    /// Password resets, API key rotation, account deletion.
    Sensitive,
    /// Trade order submission.
    Trading,
}

/// Window and request budget for one preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetLimits {
    pub window: Duration,
    pub max_requests: u32,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Auth, Preset::Api, Preset::Sensitive, Preset::Trading];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Auth => "auth",
            Preset::Api => "api",
            Preset::Sensitive => "sensitive",
            Preset::Trading => "trading",
        }
    }

    pub fn defaults(self) -> PresetLimits {
        match self {
            Preset::Auth => PresetLimits {
                window: Duration::from_secs(15 * 60),
                max_requests: 5,
            },
            Preset::Api => PresetLimits {
                window: Duration::from_secs(60),
                max_requests: 100,
            },
            Preset::Sensitive => PresetLimits {
                window: Duration::from_secs(60 * 60),
                max_requests: 3,
            },
            Preset::Trading => PresetLimits {
                window: Duration::from_secs(60),
                max_requests: 10,
            },
        }
    }

    fn message(self) -> Option<&'static str> {
        match self {
            Preset::Auth => Some("Too many authentication attempts, please try again later."),
            Preset::Api => None,
            Preset::Sensitive => {
                Some("Too many attempts for this sensitive operation, please try again later.")
            }
            Preset::Trading => Some("Too many order submissions, please slow down."),
        }
    }

    pub fn policy(self, limits: PresetLimits) -> Result<RateLimitPolicy, PolicyError> {
        let policy = RateLimitPolicy::new(self.name(), limits.window, limits.max_requests)?;
        Ok(match self.message() {
            Some(message) => policy.with_message(message),
            None => policy,
        })
    }
}

/// One policy per [`Preset`].
#[derive(Debug, Clone)]
pub struct RateLimitPresets {
    pub auth: RateLimitPolicy,
    pub api: RateLimitPolicy,
    pub sensitive: RateLimitPolicy,
    pub trading: RateLimitPolicy,
}

impl RateLimitPresets {
    /// Build every preset from the limits `limits_for` returns.
    pub fn from_limits(
        mut limits_for: impl FnMut(Preset) -> PresetLimits,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            auth: Preset::Auth.policy(limits_for(Preset::Auth))?,
            api: Preset::Api.policy(limits_for(Preset::Api))?,
            sensitive: Preset::Sensitive.policy(limits_for(Preset::Sensitive))?,
            trading: Preset::Trading.policy(limits_for(Preset::Trading))?,
        })
    }

    pub fn standard() -> Result<Self, PolicyError> {
        Self::from_limits(Preset::defaults)
    }

    pub fn get(&self, preset: Preset) -> &RateLimitPolicy {
        match preset {
            Preset::Auth => &self.auth,
            Preset::Api => &self.api,
            Preset::Sensitive => &self.sensitive,
            Preset::Trading => &self.trading,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Preset, &RateLimitPolicy)> {
        Preset::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}
