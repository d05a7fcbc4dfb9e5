//! HTTP handlers and route configuration.

mod auth;
mod health;
mod limits;

use actix_web::{HttpRequest, web};

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::{RateLimit, is_loopback};
use crate::state::AppState;

/// Configure all application routes, each scope behind its rate-limit preset.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let presets = &state.presets;
    let limit = |policy| {
        RateLimit::new(state.limiter.clone(), policy, state.failure_mode)
            .with_trusted_proxies(state.trusted_proxies.clone())
    };

    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/health")
                    .wrap(limit(presets.api.clone().skip_if(is_loopback)))
                    .route(web::get().to(health::health_check)),
            )
            .service(
                web::resource("/limits")
                    .wrap(limit(presets.api.clone()))
                    .route(web::get().to(limits::list)),
            )
            .service(
                web::scope("/auth")
                    .wrap(limit(presets.auth.clone()))
                    .route("/me", web::get().to(auth::me)),
            ),
    );
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest) -> AppResult<actix_web::HttpResponse> {
    Err(AppError::NotFound(format!(
        "No route for {} {}",
        req.method(),
        req.path()
    )))
}
