//! Authentication middleware
//!
//! Resolves the bearer token to a live session and its user.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthError, AuthService};
use crate::error::{ErrorDetails, ErrorResponse};
use crate::models::UserRole;

/// Authenticated user extracted from a session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetails {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (status, Json(body)).into_response()
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    reject(
                        StatusCode::UNAUTHORIZED,
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let (session, user) = auth_service
            .authenticate_token(bearer.token())
            .await
            .map_err(|e| match e {
                AuthError::TwoFactorPending => reject(
                    StatusCode::UNAUTHORIZED,
                    "TWO_FACTOR_REQUIRED",
                    "Complete two-factor verification first",
                ),
                AuthError::DatabaseError(msg) => {
                    tracing::error!(error = %msg, "Session lookup failed");
                    reject(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DATABASE_ERROR",
                        "Session lookup failed",
                    )
                }
                _ => reject(
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Session is invalid or has expired",
                ),
            })?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            session_id: session.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// Requires the admin role
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !matches!(user.role, UserRole::Admin) {
            return Err(reject(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Admin access required",
            ));
        }

        Ok(AdminUser(user))
    }
}
