use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Currency;

/// Balances are whole PKR
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub total_balance: i64,
    pub available_balance: i64,
    pub invested_amount: i64,
    pub total_returns: i64,
    #[sqlx(default)]
    #[serde(default)]
    pub currency: Currency,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Investment,
    Distribution,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Ledger entry. `amount` is in `currency`, `amount_base` in PKR
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: Currency,
    pub amount_base: i64,
    pub payment_method_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/wallet-transactions/deposit`
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: f64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(alias = "paymentMethod")]
    pub payment_method_id: Uuid,
    pub description: Option<String>,
    #[serde(default)]
    pub otp_verified: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub transaction_id: Uuid,
    pub amount: f64,
    pub currency: Currency,
    pub amount_base: i64,
    pub wallet: WalletBalance,
}

#[derive(Debug, Deserialize, Default)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
}
