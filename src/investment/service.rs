//! Investment service layer
//!
//! A purchase is re-validated against the current property and wallet state
//! and then debits the wallet, reserves the tokens and records the ledger
//! entry inside one database transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use super::model::{
    CreateDistributionRequest, CreateInvestmentRequest, Distribution, Investment,
    InvestmentStatus, PortfolioEntry, PortfolioSummary, WALLET_PAYMENT,
};
use crate::db;
use crate::error::ServiceError;
use crate::models::Currency;
use crate::property::{Property, PropertyStatus};
use crate::wallet::{ensure_wallet, TransactionKind, TransactionStatus};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub struct InvestmentService {
    db_pool: SqlitePool,
}

impl InvestmentService {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Buy property tokens from the wallet balance
    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreateInvestmentRequest,
    ) -> Result<Investment, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if req.payment != WALLET_PAYMENT {
            return Err(ServiceError::Validation(format!(
                "Unsupported payment source `{}`",
                req.payment
            )));
        }

        let mut tx = db::begin_write(&self.db_pool).await?;

        let property: Property = sqlx::query_as(
            r#"
            SELECT id, title, location, price_per_token, total_tokens, available_tokens, expected_yield_bps, status, created_at
            FROM properties
            WHERE id = ?
            "#,
        )
        .bind(req.property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Property".to_string()))?;

        if property.status != PropertyStatus::Open {
            return Err(ServiceError::Conflict(format!(
                "{} is not open for investment",
                property.title
            )));
        }

        let expected = req
            .tokens_purchased
            .checked_mul(property.price_per_token)
            .ok_or_else(|| ServiceError::Validation("Investment amount overflow".to_string()))?;
        if req.investment_amount != expected {
            return Err(ServiceError::Validation(format!(
                "Investment amount must equal {} tokens x {} PKR = {} PKR",
                req.tokens_purchased, property.price_per_token, expected
            )));
        }

        if req.tokens_purchased > property.available_tokens {
            return Err(ServiceError::InsufficientTokens {
                requested: req.tokens_purchased,
                available: property.available_tokens,
            });
        }

        ensure_wallet(&mut tx, user_id).await?;
        let available: i64 =
            sqlx::query_scalar("SELECT available_balance FROM wallets WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if available < expected {
            tracing::warn!(
                user_id = %user_id,
                required = expected,
                available,
                "Investment rejected for insufficient balance"
            );
            return Err(ServiceError::InsufficientBalance {
                required: expected,
                available,
            });
        }

        let now = Utc::now();

        debit_for_investment(&mut tx, user_id, expected, now).await?;

        let reserved = sqlx::query(
            r#"
            UPDATE properties
            SET available_tokens = available_tokens - ?,
                status = CASE WHEN available_tokens = ? THEN 'funded' ELSE status END
            WHERE id = ? AND available_tokens >= ?
            "#,
        )
        .bind(req.tokens_purchased)
        .bind(req.tokens_purchased)
        .bind(property.id)
        .bind(req.tokens_purchased)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if reserved == 0 {
            return Err(ServiceError::Conflict(
                "Tokens were taken by another purchase".to_string(),
            ));
        }

        let investment = Investment {
            id: Uuid::new_v4(),
            property_id: property.id,
            tokens_purchased: req.tokens_purchased,
            investment_amount: expected,
            total_earned: 0,
            payment: req.payment,
            status: InvestmentStatus::Active,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO investments (id, user_id, property_id, tokens_purchased, investment_amount, total_earned, payment, status, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(investment.id)
        .bind(user_id)
        .bind(investment.property_id)
        .bind(investment.tokens_purchased)
        .bind(investment.investment_amount)
        .bind(&investment.payment)
        .bind(investment.status)
        .bind(investment.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, kind, amount, currency, amount_base, payment_method_id, reference_id, description, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(TransactionKind::Investment)
        .bind(expected as f64)
        .bind(Currency::Pkr)
        .bind(expected)
        .bind(investment.id)
        .bind(format!("{} tokens of {}", investment.tokens_purchased, property.title))
        .bind(TransactionStatus::Completed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            investment_id = %investment.id,
            property_id = %property.id,
            tokens = investment.tokens_purchased,
            amount = investment.investment_amount,
            "Investment created"
        );

        Ok(investment)
    }

    /// Newest first
    pub async fn my_investments(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Investment>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let investments = sqlx::query_as(
            r#"
            SELECT id, property_id, tokens_purchased, investment_amount, total_earned, payment, status, created_at
            FROM investments
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(investments)
    }

    /// Holdings grouped by property
    pub async fn portfolio(&self, user_id: Uuid) -> Result<PortfolioSummary, ServiceError> {
        let holdings: Vec<PortfolioEntry> = sqlx::query_as(
            r#"
            SELECT p.id AS property_id,
                   p.title AS property_title,
                   p.location AS location,
                   p.price_per_token AS price_per_token,
                   SUM(i.tokens_purchased) AS tokens,
                   SUM(i.investment_amount) AS invested,
                   SUM(i.total_earned) AS earned,
                   SUM(i.tokens_purchased) * p.price_per_token AS current_value,
                   COUNT(i.id) AS investment_count
            FROM investments i
            JOIN properties p ON p.id = i.property_id
            WHERE i.user_id = ?
            GROUP BY p.id, p.title, p.location, p.price_per_token
            ORDER BY invested DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PortfolioSummary::from_holdings(holdings))
    }

    pub async fn my_distributions(&self, user_id: Uuid) -> Result<Vec<Distribution>, ServiceError> {
        let distributions = sqlx::query_as(
            r#"
            SELECT id, investment_id, amount, period, created_at
            FROM distributions
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(distributions)
    }

    /// Pay income against an investment into its owner's wallet
    pub async fn record_distribution(
        &self,
        req: CreateDistributionRequest,
    ) -> Result<Distribution, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let mut tx = db::begin_write(&self.db_pool).await?;

        let owner: Uuid = sqlx::query_scalar("SELECT user_id FROM investments WHERE id = ?")
            .bind(req.investment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Investment".to_string()))?;

        let now = Utc::now();

        sqlx::query("UPDATE investments SET total_earned = total_earned + ? WHERE id = ?")
            .bind(req.amount)
            .bind(req.investment_id)
            .execute(&mut *tx)
            .await?;

        ensure_wallet(&mut tx, owner).await?;
        sqlx::query(
            r#"
            UPDATE wallets
            SET total_balance = total_balance + ?,
                available_balance = available_balance + ?,
                total_returns = total_returns + ?,
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(req.amount)
        .bind(req.amount)
        .bind(req.amount)
        .bind(now)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        let distribution = Distribution {
            id: Uuid::new_v4(),
            investment_id: req.investment_id,
            amount: req.amount,
            period: req.period.trim().to_string(),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO distributions (id, investment_id, user_id, amount, period, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(distribution.id)
        .bind(distribution.investment_id)
        .bind(owner)
        .bind(distribution.amount)
        .bind(&distribution.period)
        .bind(distribution.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, kind, amount, currency, amount_base, payment_method_id, reference_id, description, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(TransactionKind::Distribution)
        .bind(distribution.amount as f64)
        .bind(Currency::Pkr)
        .bind(distribution.amount)
        .bind(distribution.id)
        .bind(format!("Distribution {}", distribution.period))
        .bind(TransactionStatus::Completed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %owner,
            investment_id = %distribution.investment_id,
            amount = distribution.amount,
            period = %distribution.period,
            "Distribution recorded"
        );

        Ok(distribution)
    }
}

/// Move `amount` from available balance to invested amount
async fn debit_for_investment(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let debited = sqlx::query(
        r#"
        UPDATE wallets
        SET available_balance = available_balance - ?,
            invested_amount = invested_amount + ?,
            updated_at = ?
        WHERE user_id = ? AND available_balance >= ?
        "#,
    )
    .bind(amount)
    .bind(amount)
    .bind(now)
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if debited == 0 {
        let available: i64 =
            sqlx::query_scalar("SELECT available_balance FROM wallets WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
                .unwrap_or(0);
        return Err(ServiceError::InsufficientBalance {
            required: amount,
            available,
        });
    }
    Ok(())
}
