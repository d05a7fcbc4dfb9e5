//! # Tradelog API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

use tradelog_infra::InMemoryCache;

mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting Tradelog API Server on {}:{}",
        config.host,
        config.port
    );

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize rate limiter");
            std::process::exit(1);
        }
    };

    if let Some(cache) = state.memory_cache.clone() {
        actix_rt::spawn(sweep_expired(cache));
    }

    HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(state.tokens.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &state))
            .default_service(web::to(handlers::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

/// Drop windows whose TTL has lapsed but were never read again.
async fn sweep_expired(cache: Arc<InMemoryCache>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let purged = cache.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "Swept expired rate limit windows");
        }
    }
}
