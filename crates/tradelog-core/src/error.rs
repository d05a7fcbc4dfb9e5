//! Domain-level error types.

use thiserror::Error;

/// Invalid rate-limit policy configuration.
///
/// Raised when a policy is built, never while a request is being checked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Policy '{0}': window must be at least 1 ms")]
    ZeroWindow(String),

    #[error("Policy '{0}': max_requests must be greater than zero")]
    ZeroMaxRequests(String),
}

/// Broker account pool errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Account pool capacity must be greater than zero")]
    ZeroCapacity,

    #[error("All {capacity} account slots are in use")]
    Exhausted { capacity: usize },

    #[error("Account pool lock poisoned")]
    Poisoned,
}
