//! Wallet service layer - balances and OTP-gated deposits

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::model::{
    DepositRequest, DepositResponse, Transaction, TransactionKind, TransactionStatus,
    WalletBalance,
};
use crate::db;
use crate::error::ServiceError;
use crate::payment_method::PaymentMethodStatus;
use crate::workflow::exchange::ExchangeRates;

const DEFAULT_TRANSACTION_LIMIT: i64 = 50;
const MAX_TRANSACTION_LIMIT: i64 = 200;

/// Largest single deposit, in PKR
pub const MAX_DEPOSIT: i64 = 50_000_000;

/// Create the zero wallet row if the user has none yet
pub(crate) async fn ensure_wallet(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO wallets (user_id, total_balance, available_balance, invested_amount, total_returns, updated_at)
        VALUES (?, 0, 0, 0, 0, ?)
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn load_wallet(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<WalletBalance, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT total_balance, available_balance, invested_amount, total_returns, updated_at
        FROM wallets
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub struct WalletService {
    db_pool: SqlitePool,
    exchange_rates: ExchangeRates,
}

impl WalletService {
    pub fn new(db_pool: SqlitePool, exchange_rates: ExchangeRates) -> Self {
        Self {
            db_pool,
            exchange_rates,
        }
    }

    pub fn exchange_rates(&self) -> &ExchangeRates {
        &self.exchange_rates
    }

    /// Current balance, creating an empty wallet on first access
    pub async fn balance(&self, user_id: Uuid) -> Result<WalletBalance, ServiceError> {
        let mut conn = self.db_pool.acquire().await?;
        ensure_wallet(&mut conn, user_id).await?;
        Ok(load_wallet(&mut conn, user_id).await?)
    }

    /// Credit the wallet from a saved card.
    ///
    /// Only accepted once the caller has passed OTP verification. The amount
    /// is converted into PKR with the configured rate table and the balance
    /// update, ledger entry and card verification commit together.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        req: DepositRequest,
    ) -> Result<DepositResponse, ServiceError> {
        if !req.otp_verified {
            tracing::warn!(user_id = %user_id, "Deposit attempted without OTP verification");
            return Err(ServiceError::OtpNotVerified);
        }
        if !req.amount.is_finite() || req.amount <= 0.0 {
            return Err(ServiceError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let amount_base = self.exchange_rates.to_base(req.amount, req.currency)?;
        if amount_base <= 0 {
            return Err(ServiceError::Validation(
                "Amount is too small to credit".to_string(),
            ));
        }
        if amount_base > MAX_DEPOSIT {
            return Err(ServiceError::Validation(format!(
                "A single deposit cannot exceed {} PKR",
                MAX_DEPOSIT
            )));
        }

        let mut tx = db::begin_write(&self.db_pool).await?;

        let status: PaymentMethodStatus = sqlx::query_scalar(
            "SELECT status FROM payment_methods WHERE id = ? AND user_id = ?",
        )
        .bind(req.payment_method_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Payment method".to_string()))?;

        if status != PaymentMethodStatus::Active {
            return Err(ServiceError::Validation(
                "Payment method is not active".to_string(),
            ));
        }

        ensure_wallet(&mut tx, user_id).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE wallets
            SET total_balance = total_balance + ?,
                available_balance = available_balance + ?,
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(amount_base)
        .bind(amount_base)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let transaction_id = Uuid::new_v4();
        let description = req
            .description
            .clone()
            .unwrap_or_else(|| "Wallet top-up".to_string());
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, kind, amount, currency, amount_base, payment_method_id, reference_id, description, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .bind(TransactionKind::Deposit)
        .bind(req.amount)
        .bind(req.currency)
        .bind(amount_base)
        .bind(req.payment_method_id)
        .bind(description)
        .bind(TransactionStatus::Completed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE payment_methods SET is_verified = 1 WHERE id = ?")
            .bind(req.payment_method_id)
            .execute(&mut *tx)
            .await?;

        let wallet = load_wallet(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %transaction_id,
            amount = req.amount,
            currency = %req.currency,
            amount_base,
            "Deposit completed"
        );

        Ok(DepositResponse {
            transaction_id,
            amount: req.amount,
            currency: req.currency,
            amount_base,
            wallet,
        })
    }

    /// Ledger entries, newest first
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
            .clamp(1, MAX_TRANSACTION_LIMIT);

        let transactions = sqlx::query_as(
            r#"
            SELECT id, kind, amount, currency, amount_base, payment_method_id, reference_id, description, status, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(transactions)
    }
}
