//! Payment method models

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CardBrand, Currency};

/// A saved card. Only the brand and last four digits are ever kept.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: Uuid,
    pub card_type: CardBrand,
    pub masked_number: String,
    pub last_four: String,
    pub holder_name: String,
    pub expiry_month: i64,
    pub expiry_year: i64,
    pub currency: Currency,
    pub is_default: bool,
    pub is_verified: bool,
    pub status: PaymentMethodStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn expiry_label(&self) -> String {
        format!("{:02}/{}", self.expiry_month, self.expiry_year % 100)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethodStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

/// Personal and address details captured alongside a new card
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 7, message = "A valid phone number is required"))]
    pub phone: String,
    pub company: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 3, message = "Postal code is required"))]
    pub postal_code: String,
    #[serde(default)]
    pub currency: Currency,
}

/// Body of `POST /api/payment-methods`
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentMethodRequest {
    pub card_number: String,
    pub holder_name: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    #[serde(default)]
    pub currency: Currency,
    pub billing: Option<BillingInfo>,
    #[serde(default)]
    pub is_default: bool,
}

impl fmt::Debug for CreatePaymentMethodRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatePaymentMethodRequest")
            .field("card_number", &"<redacted>")
            .field("holder_name", &self.holder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("currency", &self.currency)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

/// Payment method as some backends send it: snake_case or camelCase keys,
/// loosely typed values.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPaymentMethod {
    pub id: Option<Uuid>,
    #[serde(alias = "card_type", alias = "brand")]
    pub card_type: Option<String>,
    #[serde(alias = "masked_number", alias = "cardNumber", alias = "card_number")]
    pub masked_number: Option<String>,
    #[serde(alias = "last_four", alias = "last4")]
    pub last_four: Option<String>,
    #[serde(alias = "holder_name", alias = "cardHolderName", alias = "card_holder_name")]
    pub holder_name: Option<String>,
    #[serde(alias = "expiry_month", alias = "expMonth")]
    pub expiry_month: Option<i64>,
    #[serde(alias = "expiry_year", alias = "expYear")]
    pub expiry_year: Option<i64>,
    pub currency: Option<String>,
    #[serde(alias = "is_default")]
    pub is_default: Option<bool>,
    #[serde(alias = "is_verified", alias = "verified")]
    pub is_verified: Option<bool>,
    pub status: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Why a payload could not be mapped onto [`PaymentMethod`]
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("payment method is missing `{0}`")]
    Missing(&'static str),

    #[error("unsupported card brand `{0}`")]
    UnsupportedBrand(String),
}

/// The one place backend field-naming variants are mapped onto the
/// canonical shape.
pub fn normalize_payment_method(raw: RawPaymentMethod) -> Result<PaymentMethod, NormalizeError> {
    let id = raw.id.ok_or(NormalizeError::Missing("id"))?;

    let brand_name = raw
        .card_type
        .ok_or(NormalizeError::Missing("cardType"))?
        .to_lowercase();
    let card_type = match brand_name.as_str() {
        "visa" => CardBrand::Visa,
        "mastercard" | "master" | "mc" => CardBrand::Mastercard,
        _ => return Err(NormalizeError::UnsupportedBrand(brand_name)),
    };

    // Never trust a number field to be masked already
    let last_four = raw
        .last_four
        .or_else(|| {
            raw.masked_number
                .as_deref()
                .map(crate::workflow::card::last_four)
        })
        .filter(|l| !l.is_empty())
        .ok_or(NormalizeError::Missing("lastFour"))?;

    let status = match raw.status.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("active") => PaymentMethodStatus::Active,
        Some("expired") => PaymentMethodStatus::Expired,
        Some(_) => PaymentMethodStatus::Inactive,
    };

    Ok(PaymentMethod {
        id,
        card_type,
        masked_number: format!("**** **** **** {}", last_four),
        last_four,
        holder_name: raw.holder_name.unwrap_or_default(),
        expiry_month: raw.expiry_month.ok_or(NormalizeError::Missing("expiryMonth"))?,
        expiry_year: raw.expiry_year.ok_or(NormalizeError::Missing("expiryYear"))?,
        currency: raw
            .currency
            .as_deref()
            .and_then(Currency::from_code)
            .unwrap_or_default(),
        is_default: raw.is_default.unwrap_or(false),
        is_verified: raw.is_verified.unwrap_or(false),
        status,
        created_at: raw.created_at.unwrap_or_else(Utc::now),
    })
}

/// Normalize a list payload, dropping (and logging) entries that cannot be mapped
pub fn normalize_payment_methods(values: Vec<serde_json::Value>) -> Vec<PaymentMethod> {
    values
        .into_iter()
        .filter_map(|value| {
            let raw: RawPaymentMethod = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed payment method");
                    return None;
                }
            };
            match normalize_payment_method(raw) {
                Ok(method) => Some(method),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping payment method");
                    None
                }
            }
        })
        .collect()
}
