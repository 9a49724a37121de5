use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KycApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub nationality: String,
    pub status: KycStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DocumentType {
    Cnic,
    Passport,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmitKycRequest {
    #[validate(length(min = 2, max = 120))]
    pub full_name: String,
    pub document_type: DocumentType,
    #[validate(length(min = 5, max = 32))]
    pub document_number: String,
    #[validate(length(min = 2, max = 64))]
    pub nationality: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewKycRequest {
    pub status: KycStatus,
}

/// Latest application state for the current user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KycStatusResponse {
    /// `None` until the user has applied
    pub status: Option<KycStatus>,
    pub application: Option<KycApplication>,
}
