//! # Tradelog Shared
//!
//! Wire types shared between the backend and the web/admin frontends.

pub mod dto;
pub mod response;

pub use dto::{IdentityResponse, RateLimitPolicyResponse, RateLimitsResponse};
pub use response::{ApiResponse, ErrorResponse};
