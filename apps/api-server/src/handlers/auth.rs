//! Authentication handlers.

use actix_web::HttpResponse;

use tradelog_shared::IdentityResponse;

use crate::middleware::auth::Identity;

/// GET /api/auth/me - Protected route
pub async fn me(identity: Identity) -> HttpResponse {
    HttpResponse::Ok().json(IdentityResponse {
        user_id: identity.user_id.to_string(),
        email: identity.email,
        roles: identity.roles,
    })
}
