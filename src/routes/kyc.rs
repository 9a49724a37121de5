//! KYC routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::kyc;
use crate::state::AppState;

pub fn kyc_routes() -> Router<AppState> {
    Router::new()
        .route("/api/kyc/applications", post(kyc::submit_application))
        .route(
            "/api/kyc/applications/:id/review",
            post(kyc::review_application),
        )
        .route("/api/kyc/status", get(kyc::get_status))
}
