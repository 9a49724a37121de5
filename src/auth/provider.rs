//! Identity providers
//!
//! `AuthService` delegates credential checks to an `AuthProvider` chosen at
//! startup. `DemoAuthProvider` resolves every login to one canned identity
//! and is only wired in when `AUTH_MODE=demo` outside production.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::service::AuthError;
use crate::models::{User, UserRole};

pub const DEMO_USER_EMAIL: &str = "demo@proptoken.local";

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, two_factor_enabled, created_at, updated_at";

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve credentials to a user
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn name(&self) -> &'static str;
}

/// Email + bcrypt password check against the users table
pub struct PasswordAuthProvider {
    db_pool: SqlitePool,
}

impl PasswordAuthProvider {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AuthProvider for PasswordAuthProvider {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = find_user_by_email(&self.db_pool, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Rows without a bcrypt hash (the demo identity) can never log in here
        let valid = match bcrypt::verify(password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(error = %e, "Stored hash is not a bcrypt hash");
                false
            }
        };
        if !valid {
            tracing::warn!(email = %email, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    fn name(&self) -> &'static str {
        "password"
    }
}

/// Fixed demo identity; ignores the supplied credentials
pub struct DemoAuthProvider {
    db_pool: SqlitePool,
}

impl DemoAuthProvider {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AuthProvider for DemoAuthProvider {
    async fn authenticate(&self, _email: &str, _password: &str) -> Result<User, AuthError> {
        if let Some(user) = find_user_by_email(&self.db_pool, DEMO_USER_EMAIL).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: DEMO_USER_EMAIL.to_string(),
            // Not a bcrypt hash, so password login for this row always fails
            password_hash: "!demo".to_string(),
            first_name: "Demo".to_string(),
            last_name: "User".to_string(),
            phone: None,
            role: UserRole::Investor,
            two_factor_enabled: false,
            created_at: now,
            updated_at: now,
        };
        insert_user(&self.db_pool, &user).await?;
        tracing::info!(user_id = %user.id, "Created demo identity");

        Ok(user)
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

pub(crate) async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, AuthError> {
    let user = sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email.to_lowercase())
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub(crate) async fn find_user_by_id(pool: &SqlitePool, id: Uuid) -> Result<User, AuthError> {
    sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::UserNotFound)
}

/// Insert a user together with its empty wallet
pub(crate) async fn insert_user(pool: &SqlitePool, user: &User) -> Result<(), AuthError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, phone, role, two_factor_enabled, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(user.email.to_lowercase())
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.role)
    .bind(user.two_factor_enabled)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AuthError::EmailTaken;
            }
        }
        AuthError::from(e)
    })?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO wallets (user_id, total_balance, available_balance, invested_amount, total_returns, updated_at)
        VALUES (?, 0, 0, 0, 0, ?)
        "#,
    )
    .bind(user.id)
    .bind(user.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
