//! Investment, portfolio and distribution routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::investments;
use crate::state::AppState;

pub fn investment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/investments", post(investments::create_investment))
        .route(
            "/api/investments/my-investments",
            get(investments::my_investments),
        )
        .route("/api/investments/portfolio", get(investments::portfolio))
        .route("/api/distributions", post(investments::create_distribution))
        .route("/api/distributions/mine", get(investments::my_distributions))
}
