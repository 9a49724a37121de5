//! Saved card handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::payment_method::{CreatePaymentMethodRequest, PaymentMethod, PaymentMethodService};

/// GET /api/payment-methods
pub async fn list_payment_methods(
    State(service): State<Arc<PaymentMethodService>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PaymentMethod>>, ApiError> {
    Ok(Json(service.list(user.user_id).await?))
}

/// POST /api/payment-methods
pub async fn create_payment_method(
    State(service): State<Arc<PaymentMethodService>>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePaymentMethodRequest>,
) -> Result<(StatusCode, Json<PaymentMethod>), ApiError> {
    let method = service.create(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(method)))
}
