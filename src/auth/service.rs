//! Authentication service
//!
//! Registration, login, second factor, session lookup and logout.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::provider::{find_user_by_email, find_user_by_id, insert_user, AuthProvider};
use super::token::{generate_session_token, hash_token};
use crate::models::{AuthResponse, RegisterRequest, Session, User, UserRole};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid verification code")]
    InvalidTwoFactorCode,

    #[error("Two-factor verification pending")]
    TwoFactorPending,

    #[error("User not found")]
    UserNotFound,

    #[error("Session not found or revoked")]
    SessionNotFound,
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

/// Request metadata recorded on the session row
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db_pool: SqlitePool,
    provider: Arc<dyn AuthProvider>,
    session_ttl_hours: i64,
    two_factor_codes: Vec<String>,
    bcrypt_cost: u32,
    admin_emails: Vec<String>,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        db_pool: SqlitePool,
        provider: Arc<dyn AuthProvider>,
        session_ttl_hours: i64,
        two_factor_codes: Vec<String>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db_pool,
            provider,
            session_ttl_hours,
            two_factor_codes,
            bcrypt_cost,
            admin_emails: Vec::new(),
        }
    }

    /// Emails that are granted the admin role on registration
    pub fn with_admin_emails(mut self, emails: Vec<String>) -> Self {
        self.admin_emails = emails.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Create an account and sign it in
    pub async fn register(
        &self,
        req: RegisterRequest,
        client: ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        if find_user_by_email(&self.db_pool, &req.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = bcrypt::hash(&req.password, self.bcrypt_cost)
            .map_err(|e| AuthError::HashingError(e.to_string()))?;

        let email = req.email.to_lowercase();
        let role = if self.admin_emails.contains(&email) {
            UserRole::Admin
        } else {
            UserRole::Investor
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            role,
            two_factor_enabled: req.enable_two_factor,
            created_at: now,
            updated_at: now,
        };
        insert_user(&self.db_pool, &user).await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

        // Registration itself counts as the first factor check
        self.open_session(user, false, client).await
    }

    /// Check credentials via the configured provider and open a session
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        let user = self.provider.authenticate(email, password).await?;
        let pending = user.two_factor_enabled;
        self.open_session(user, pending, client).await
    }

    /// Complete a pending login with a second-factor code
    pub async fn verify_two_factor(
        &self,
        challenge_token: &str,
        code: &str,
    ) -> Result<AuthResponse, AuthError> {
        let session = self.find_live_session(challenge_token).await?;
        if !session.pending_two_factor {
            return Err(AuthError::SessionNotFound);
        }

        if !self.two_factor_codes.iter().any(|c| c == code) {
            tracing::warn!(user_id = %session.user_id, "Rejected second-factor code");
            return Err(AuthError::InvalidTwoFactorCode);
        }

        // Rotate the token so the challenge token can't be used as a bearer
        let token = generate_session_token();
        sqlx::query(
            r#"
            UPDATE sessions SET token_hash = ?, pending_two_factor = 0
            WHERE id = ? AND pending_two_factor = 1
            "#,
        )
        .bind(hash_token(&token))
        .bind(session.id)
        .execute(&self.db_pool)
        .await?;

        let user = find_user_by_id(&self.db_pool, session.user_id).await?;
        tracing::info!(user_id = %user.id, "Second factor verified");

        Ok(AuthResponse {
            token: Some(token),
            challenge_token: None,
            requires_two_factor: false,
            token_type: "Bearer".to_string(),
            expires_at: session.expires_at,
            user: user.into(),
        })
    }

    /// Resolve a bearer token to its session and user
    pub async fn authenticate_token(&self, token: &str) -> Result<(Session, User), AuthError> {
        let session = self.find_live_session(token).await?;
        if session.pending_two_factor {
            return Err(AuthError::TwoFactorPending);
        }
        let user = find_user_by_id(&self.db_pool, session.user_id).await?;
        Ok((session, user))
    }

    /// Revoke a session (logout)
    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), AuthError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE sessions SET revoked = 1
            WHERE id = ? AND revoked = 0
            "#,
        )
        .bind(session_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AuthError::SessionNotFound);
        }

        Ok(())
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, AuthError> {
        find_user_by_id(&self.db_pool, user_id).await
    }

    async fn open_session(
        &self,
        user: User,
        pending_two_factor: bool,
        client: ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.session_ttl_hours);

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, pending_two_factor, ip_address, user_agent, expires_at, revoked, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(pending_two_factor)
        .bind(&client.ip_address)
        .bind(&client.user_agent)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(
            user_id = %user.id,
            provider = self.provider.name(),
            pending_two_factor,
            "Session opened"
        );

        let (token, challenge_token) = if pending_two_factor {
            (None, Some(token))
        } else {
            (Some(token), None)
        };

        Ok(AuthResponse {
            token,
            challenge_token,
            requires_two_factor: pending_two_factor,
            token_type: "Bearer".to_string(),
            expires_at,
            user: user.into(),
        })
    }

    async fn find_live_session(&self, token: &str) -> Result<Session, AuthError> {
        let session: Session = sqlx::query_as(
            r#"
            SELECT id, user_id, token_hash, pending_two_factor, ip_address, user_agent, expires_at, revoked, created_at
            FROM sessions
            WHERE token_hash = ?
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        if session.revoked || session.expires_at <= Utc::now() {
            return Err(AuthError::SessionNotFound);
        }

        Ok(session)
    }
}
