//! Rate limit introspection.

use actix_web::{HttpResponse, web};

use tradelog_core::rate_limit::RateLimitPolicy;
use tradelog_shared::{ApiResponse, RateLimitPolicyResponse, RateLimitsResponse};

use crate::state::AppState;

/// GET /api/limits - the policies this instance enforces.
pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    let policies = state
        .presets
        .iter()
        .map(|(_, policy)| describe(policy))
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok(RateLimitsResponse {
        backend: state.backend.as_str().to_string(),
        failure_mode: state.failure_mode.as_str().to_string(),
        policies,
    }))
}

fn describe(policy: &RateLimitPolicy) -> RateLimitPolicyResponse {
    RateLimitPolicyResponse {
        name: policy.name().to_string(),
        window_secs: policy.window().as_secs(),
        max_requests: policy.max_requests(),
        message: policy.denial_message().to_string(),
    }
}
