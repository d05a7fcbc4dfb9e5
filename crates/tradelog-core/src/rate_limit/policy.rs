//! Rate-limit policy value object.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::identity::RequestIdentity;
use crate::error::PolicyError;

/// Message returned on denial when the policy does not set one.
pub const DEFAULT_DENIAL_MESSAGE: &str = "Too many requests, please try again later.";

/// Derives the identity key a request is counted under.
pub type KeyFn = Arc<dyn Fn(&RequestIdentity) -> String + Send + Sync>;

/// Bypass predicate, evaluated before any state lookup.
pub type SkipFn = Arc<dyn Fn(&RequestIdentity) -> bool + Send + Sync>;

/// How many requests an identity may make within a trailing window.
///
/// Immutable once built. Cloning is cheap: the closures are shared.
#[derive(Clone)]
pub struct RateLimitPolicy {
    name: String,
    window: Duration,
    max_requests: u32,
    key_fn: Option<KeyFn>,
    skip_if: Option<SkipFn>,
    message: Option<String>,
}

impl RateLimitPolicy {
    /// Build a policy, rejecting a window under 1 ms or a zero request budget.
    pub fn new(
        name: impl Into<String>,
        window: Duration,
        max_requests: u32,
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        if window.as_millis() == 0 {
            return Err(PolicyError::ZeroWindow(name));
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests(name));
        }

        Ok(Self {
            name,
            window,
            max_requests,
            key_fn: None,
            skip_if: None,
            message: None,
        })
    }

    /// Replace the default `{method}:{path}:{user}:{ip}` key.
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&RequestIdentity) -> String + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Exempt requests matching `predicate` from counting.
    pub fn skip_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestIdentity) -> bool + Send + Sync + 'static,
    {
        self.skip_if = Some(Arc::new(predicate));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn should_skip(&self, request: &RequestIdentity) -> bool {
        self.skip_if.as_ref().is_some_and(|skip| skip(request))
    }

    pub fn key_for(&self, request: &RequestIdentity) -> String {
        match &self.key_fn {
            Some(key_fn) => key_fn(request),
            None => request.default_key(),
        }
    }

    pub fn denial_message(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_DENIAL_MESSAGE)
    }
}

impl fmt::Debug for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitPolicy")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("custom_key", &self.key_fn.is_some())
            .field("has_skip", &self.skip_if.is_some())
            .field("message", &self.message)
            .finish()
    }
}
