//! Authentication HTTP handlers
//!
//! Registration, password login, second factor and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use validator::Validate;

use super::AuthenticatedUser;
use crate::auth::ClientInfo;
use crate::error::ApiError;
use crate::models::{
    AuthResponse, LoginRequest, RegisterRequest, UserResponse, VerifyTwoFactorRequest,
};
use crate::state::AppState;

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ClientInfo {
        ip_address: header_str("x-forwarded-for")
            .and_then(|s| s.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header_str("x-real-ip")),
        user_agent: header_str(header::USER_AGENT.as_str()),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    req.validate()?;
    let response = state
        .auth_service
        .register(req, client_info(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
///
/// Accounts with a second factor get a `challengeToken` instead of a
/// bearer token.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    req.validate()?;
    let response = state
        .auth_service
        .login(&req.email, &req.password, client_info(&headers))
        .await?;
    Ok(Json(response))
}

/// POST /api/auth/verify-2fa
pub async fn verify_two_factor(
    State(state): State<AppState>,
    Json(req): Json<VerifyTwoFactorRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    req.validate()?;
    let response = state
        .auth_service
        .verify_two_factor(&req.challenge_token, &req.code)
        .await?;
    Ok(Json(response))
}

/// POST /api/auth/logout - Revoke current session
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.auth_service.revoke_session(user.session_id).await?;
    tracing::info!(user_id = %user.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me - Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth_service.get_user_by_id(user.user_id).await?;
    Ok(Json(user.into()))
}
