//! Token purchase, portfolio and distribution handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::investment::{
    CreateDistributionRequest, CreateInvestmentRequest, Distribution, Investment,
    InvestmentQuery, InvestmentService, PortfolioSummary,
};

/// POST /api/investments
pub async fn create_investment(
    State(service): State<Arc<InvestmentService>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateInvestmentRequest>,
) -> Result<(StatusCode, Json<Investment>), ApiError> {
    let investment = service.create(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(investment)))
}

/// GET /api/investments/my-investments?limit=N
pub async fn my_investments(
    State(service): State<Arc<InvestmentService>>,
    user: AuthenticatedUser,
    Query(query): Query<InvestmentQuery>,
) -> Result<Json<Vec<Investment>>, ApiError> {
    Ok(Json(service.my_investments(user.user_id, query.limit).await?))
}

/// GET /api/investments/portfolio
pub async fn portfolio(
    State(service): State<Arc<InvestmentService>>,
    user: AuthenticatedUser,
) -> Result<Json<PortfolioSummary>, ApiError> {
    Ok(Json(service.portfolio(user.user_id).await?))
}

/// GET /api/distributions/mine
pub async fn my_distributions(
    State(service): State<Arc<InvestmentService>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Distribution>>, ApiError> {
    Ok(Json(service.my_distributions(user.user_id).await?))
}

/// POST /api/distributions (admin)
pub async fn create_distribution(
    State(service): State<Arc<InvestmentService>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateDistributionRequest>,
) -> Result<(StatusCode, Json<Distribution>), ApiError> {
    let distribution = service.record_distribution(req).await?;
    tracing::info!(admin_id = %admin.user_id, distribution_id = %distribution.id, "Distribution recorded");
    Ok((StatusCode::CREATED, Json(distribution)))
}
