//! Fixtures shared by the service unit tests

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{User, UserRole};

pub async fn pool() -> SqlitePool {
    db::connect_and_migrate(&Config::for_testing())
        .await
        .expect("in-memory database")
}

pub async fn seed_user(pool: &SqlitePool, email: &str) -> Uuid {
    seed_user_with_role(pool, email, UserRole::Investor).await
}

pub async fn seed_user_with_role(pool: &SqlitePool, email: &str, role: UserRole) -> Uuid {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "!test".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: None,
        role,
        two_factor_enabled: false,
        created_at: now,
        updated_at: now,
    };
    crate::auth::insert_user(pool, &user)
        .await
        .expect("insert user");
    user.id
}

/// Active Visa ending 1111 owned by `user_id`
pub async fn seed_card(pool: &SqlitePool, user_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO payment_methods (id, user_id, card_type, masked_number, last_four, holder_name, expiry_month, expiry_year, currency, is_default, is_verified, status, created_at)
        VALUES (?, ?, 'visa', '**** **** **** 1111', '1111', 'Test User', 12, 2099, 'PKR', 1, 0, 'active', ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("insert card");
    id
}

pub async fn seed_property(pool: &SqlitePool, price_per_token: i64, tokens: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO properties (id, title, location, price_per_token, total_tokens, available_tokens, expected_yield_bps, status, created_at)
        VALUES (?, 'DHA Residency', 'Lahore', ?, ?, ?, 850, 'open', ?)
        "#,
    )
    .bind(id)
    .bind(price_per_token)
    .bind(tokens)
    .bind(tokens)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("insert property");
    id
}

pub async fn credit_wallet(pool: &SqlitePool, user_id: Uuid, amount: i64) {
    sqlx::query(
        "UPDATE wallets SET total_balance = total_balance + ?, available_balance = available_balance + ? WHERE user_id = ?",
    )
    .bind(amount)
    .bind(amount)
    .bind(user_id)
    .execute(pool)
    .await
    .expect("credit wallet");
}
