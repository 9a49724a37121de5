//! KYC application handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::kyc::{KycApplication, KycService, KycStatusResponse, ReviewKycRequest, SubmitKycRequest};

/// POST /api/kyc/applications
pub async fn submit_application(
    State(service): State<Arc<KycService>>,
    user: AuthenticatedUser,
    Json(req): Json<SubmitKycRequest>,
) -> Result<(StatusCode, Json<KycApplication>), ApiError> {
    let application = service.submit(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/kyc/status
pub async fn get_status(
    State(service): State<Arc<KycService>>,
    user: AuthenticatedUser,
) -> Result<Json<KycStatusResponse>, ApiError> {
    Ok(Json(service.status(user.user_id).await?))
}

/// POST /api/kyc/applications/:id/review (admin)
pub async fn review_application(
    State(service): State<Arc<KycService>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewKycRequest>,
) -> Result<Json<KycApplication>, ApiError> {
    let application = service.review(id, req.status).await?;
    tracing::info!(admin_id = %admin.user_id, application_id = %id, status = ?application.status, "KYC reviewed");
    Ok(Json(application))
}
