//! Payment method and wallet routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{payment_methods, wallet};
use crate::state::AppState;

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/payment-methods",
            get(payment_methods::list_payment_methods).post(payment_methods::create_payment_method),
        )
        .route("/api/users/wallet", get(wallet::get_wallet))
        .route("/api/wallet-transactions", get(wallet::list_transactions))
        .route("/api/wallet-transactions/deposit", post(wallet::deposit))
}
