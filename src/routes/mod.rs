//! Route definitions for the portal API

mod auth;
mod investment;
mod kyc;
mod property;
mod wallet;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::handlers::system;
use crate::middleware::{self, RateLimiter};
use crate::state::AppState;

pub use auth::auth_routes;
pub use investment::investment_routes;
pub use kyc::kyc_routes;
pub use property::property_routes;
pub use wallet::wallet_routes;

/// Request budgets: one for all traffic, a tighter one for credential endpoints
#[derive(Clone)]
pub struct RateLimits {
    pub api: RateLimiter,
    pub auth: RateLimiter,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api: RateLimiter::new("api", config.rate_limit_rps),
            auth: RateLimiter::new("auth", (config.rate_limit_rps / 10).max(1)),
        }
    }
}

/// Assemble the full application router
pub fn create_router(state: AppState, config: &Config, limits: &RateLimits) -> Router {
    let mut app = Router::new()
        .route("/health", get(system::health))
        .route("/api/config", get(system::client_config))
        .merge(auth_routes(limits.auth.clone()))
        .merge(wallet_routes())
        .merge(investment_routes())
        .merge(property_routes())
        .merge(kyc_routes())
        .with_state(state)
        .layer(from_fn(middleware::security_headers));

    if config.environment.is_production() {
        app = app.layer(from_fn(middleware::hsts_header));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(configure_cors(config))
            .layer(from_fn(middleware::request_tracing))
            .layer(from_fn_with_state(limits.api.clone(), middleware::rate_limit)),
    )
}

fn configure_cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([middleware::REQUEST_ID_HEADER])
        .max_age(Duration::from_secs(600))
}
