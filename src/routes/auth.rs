//! Authentication routes

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::{rate_limit, RateLimiter};
use crate::state::AppState;

/// Credential endpoints sit behind their own, tighter limiter
pub fn auth_routes(limiter: RateLimiter) -> Router<AppState> {
    let credential_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify-2fa", post(auth::verify_two_factor))
        .layer(from_fn_with_state(limiter, rate_limit));

    Router::new()
        .merge(credential_routes)
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::get_current_user))
}
