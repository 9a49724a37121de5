use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A tokenized property offering. Prices are whole PKR per token.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price_per_token: i64,
    pub total_tokens: i64,
    pub available_tokens: i64,
    /// Expected annual yield in basis points
    pub expected_yield_bps: i64,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PropertyStatus {
    Open,
    Funded,
    Closed,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(range(min = 1))]
    pub price_per_token: i64,
    #[validate(range(min = 1))]
    pub total_tokens: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000))]
    pub expected_yield_bps: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
}
