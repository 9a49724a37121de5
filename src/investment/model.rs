use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Payment marker for purchases funded from the wallet balance
pub const WALLET_PAYMENT: &str = "wallet";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tokens_purchased: i64,
    /// tokens_purchased × price_per_token, whole PKR
    pub investment_amount: i64,
    pub total_earned: i64,
    pub payment: String,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Pending,
    Active,
    Completed,
}

/// Body of `POST /api/investments`
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvestmentRequest {
    pub property_id: Uuid,
    #[validate(range(min = 1, message = "At least one token must be purchased"))]
    pub tokens_purchased: i64,
    #[validate(range(min = 1, message = "Investment amount must be positive"))]
    pub investment_amount: i64,
    #[serde(default = "default_payment")]
    pub payment: String,
}

fn default_payment() -> String {
    WALLET_PAYMENT.to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct InvestmentQuery {
    pub limit: Option<i64>,
}

/// A user's holdings in one property
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    pub property_id: Uuid,
    pub property_title: String,
    pub location: String,
    pub price_per_token: i64,
    pub tokens: i64,
    pub invested: i64,
    pub earned: i64,
    pub current_value: i64,
    pub investment_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_invested: i64,
    pub total_earned: i64,
    pub total_tokens: i64,
    pub current_value: i64,
    pub holdings: Vec<PortfolioEntry>,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: Vec<PortfolioEntry>) -> Self {
        Self {
            total_invested: holdings.iter().map(|h| h.invested).sum(),
            total_earned: holdings.iter().map(|h| h.earned).sum(),
            total_tokens: holdings.iter().map(|h| h.tokens).sum(),
            current_value: holdings.iter().map(|h| h.current_value).sum(),
            holdings,
        }
    }
}

/// Rental income paid out against one investment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: Uuid,
    pub investment_id: Uuid,
    pub amount: i64,
    pub period: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateDistributionRequest {
    pub investment_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    /// Free-form label such as `2024-Q2`
    #[validate(length(min = 1, max = 32))]
    pub period: String,
}
