//! Wallet balance and top-up handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::wallet::{
    DepositRequest, DepositResponse, Transaction, TransactionQuery, WalletBalance, WalletService,
};

/// GET /api/users/wallet
pub async fn get_wallet(
    State(service): State<Arc<WalletService>>,
    user: AuthenticatedUser,
) -> Result<Json<WalletBalance>, ApiError> {
    Ok(Json(service.balance(user.user_id).await?))
}

/// POST /api/wallet-transactions/deposit
pub async fn deposit(
    State(service): State<Arc<WalletService>>,
    user: AuthenticatedUser,
    Json(req): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), ApiError> {
    let response = service.deposit(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/wallet-transactions?limit=N
pub async fn list_transactions(
    State(service): State<Arc<WalletService>>,
    user: AuthenticatedUser,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(service.transactions(user.user_id, query.limit).await?))
}
