//! PropToken portal backend library
//!
//! The HTTP API (auth, payment methods, wallet, investments, catalog, KYC)
//! and the client-side payment workflow that drives it.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod investment;
pub mod kyc;
pub mod middleware;
pub mod models;
pub mod payment_method;
pub mod property;
pub mod routes;
pub mod state;
pub mod wallet;
pub mod workflow;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

use auth::{AuthProvider, AuthService, DemoAuthProvider, PasswordAuthProvider};
use config::{AuthMode, Config};
use routes::RateLimits;
use state::AppState;

/// A fully wired application
pub struct App {
    pub router: Router,
    pub state: AppState,
    pub limits: RateLimits,
}

/// Auth service with the provider selected by `AUTH_MODE`
pub fn build_auth_service(pool: &SqlitePool, config: &Config) -> AuthService {
    let provider: Arc<dyn AuthProvider> = match config.auth_mode {
        AuthMode::Password => Arc::new(PasswordAuthProvider::new(pool.clone())),
        AuthMode::Demo => {
            tracing::warn!("AUTH_MODE=demo: every login resolves to the demo identity");
            Arc::new(DemoAuthProvider::new(pool.clone()))
        }
    };

    AuthService::new(
        pool.clone(),
        provider,
        config.session_ttl_hours,
        config.demo_two_factor_codes.clone(),
        config.bcrypt_cost,
    )
    .with_admin_emails(config.admin_emails.clone())
}

/// Connect, migrate, optionally seed, and assemble the router
pub async fn build_app(config: &Config) -> Result<App, db::DbError> {
    let pool = db::connect_and_migrate(config).await?;
    if config.seed_demo_catalog {
        db::seed_demo_catalog(&pool).await?;
    }

    let auth_service = build_auth_service(&pool, config);
    let state = AppState::new(pool, auth_service, config);
    let limits = RateLimits::from_config(config);
    let router = routes::create_router(state.clone(), config, &limits);

    Ok(App {
        router,
        state,
        limits,
    })
}
