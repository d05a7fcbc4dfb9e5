//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// The authenticated caller, as seen by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

/// One active rate-limit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicyResponse {
    pub name: String,
    pub window_secs: u64,
    pub max_requests: u32,
    pub message: String,
}

/// All active rate-limit policies plus how limiter faults are handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsResponse {
    pub backend: String,
    pub failure_mode: String,
    pub policies: Vec<RateLimitPolicyResponse>,
}
