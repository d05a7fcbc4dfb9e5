//! Outcome of an admission check.

use std::time::Duration;

use super::policy::RateLimitPolicy;

/// Result of checking one request against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The request was recorded in the window.
    Allowed {
        limit: u32,
        remaining: u32,
        /// Time until the oldest recorded request leaves the window.
        reset_after: Duration,
    },
    /// The policy's skip predicate matched; no state was read or written.
    Exempt,
    /// Over the limit. The attempt was not recorded.
    Denied {
        limit: u32,
        retry_after_secs: u64,
        message: String,
    },
}

impl Admission {
    /// Build an `Allowed` result once `count` requests (including this one)
    /// sit in the window, the oldest arriving at `oldest`.
    pub fn allowed(policy: &RateLimitPolicy, count: usize, oldest: i64, now: i64) -> Self {
        let limit = policy.max_requests();
        let used = u32::try_from(count).unwrap_or(u32::MAX);
        let reset_ms = oldest
            .saturating_add(policy.window_millis())
            .saturating_sub(now)
            .max(0);

        Admission::Allowed {
            limit,
            remaining: limit.saturating_sub(used),
            reset_after: Duration::from_millis(u64::try_from(reset_ms).unwrap_or(0)),
        }
    }

    pub fn denied(policy: &RateLimitPolicy, oldest: i64, now: i64) -> Self {
        Admission::Denied {
            limit: policy.max_requests(),
            retry_after_secs: retry_after_secs(oldest, now, policy.window_millis()),
            message: policy.denial_message().to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Denied { .. })
    }
}

/// Seconds until the request at `oldest` falls out of the window.
///
/// Rounded up and never below 1, so a denied client is never told to retry
/// immediately, even under clock skew.
pub fn retry_after_secs(oldest: i64, now: i64, window_ms: i64) -> u64 {
    let remaining_ms = oldest.saturating_add(window_ms).saturating_sub(now);
    let secs = remaining_ms.saturating_add(999) / 1000;
    u64::try_from(secs.max(1)).unwrap_or(1)
}

/// What a caller does when the limiter itself fails (cache unreachable,
/// corrupt state). Denials are never affected by this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Let the request through and log the fault.
    #[default]
    Open,
    /// Reject the request and log the fault.
    Closed,
}

impl FailureMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(FailureMode::Open),
            "closed" => Some(FailureMode::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::Open => "open",
            FailureMode::Closed => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(0, 30, 60_000), 60);
        assert_eq!(retry_after_secs(0, 1_000, 60_000), 59);
        assert_eq!(retry_after_secs(0, 1_001, 60_000), 59);
        assert_eq!(retry_after_secs(0, 59_001, 60_000), 1);
    }

    #[test]
    fn test_retry_after_clamped_to_one_second() {
        assert_eq!(retry_after_secs(0, 59_999, 60_000), 1);
        assert_eq!(retry_after_secs(0, 60_000, 60_000), 1);
        // Oldest entry already outside the window.
        assert_eq!(retry_after_secs(0, 125_000, 60_000), 1);
    }

    #[test]
    fn test_is_allowed() {
        assert!(Admission::Exempt.is_allowed());
        assert!(
            Admission::Allowed {
                limit: 1,
                remaining: 0,
                reset_after: Duration::ZERO
            }
            .is_allowed()
        );
        assert!(
            !Admission::Denied {
                limit: 1,
                retry_after_secs: 1,
                message: String::new()
            }
            .is_allowed()
        );
    }

    #[test]
    fn test_failure_mode_parse() {
        assert_eq!(FailureMode::parse("open"), Some(FailureMode::Open));
        assert_eq!(FailureMode::parse(" CLOSED "), Some(FailureMode::Closed));
        assert_eq!(FailureMode::parse("maybe"), None);
        assert_eq!(FailureMode::default(), FailureMode::Open);
    }
}
