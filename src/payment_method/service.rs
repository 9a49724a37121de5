//! Payment method persistence

use chrono::{Datelike, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use super::model::{CreatePaymentMethodRequest, PaymentMethod, PaymentMethodStatus};
use crate::db;
use crate::error::ServiceError;
use crate::workflow::card::{
    detect_card_type, last_four, mask_card_number, validate_card_number, validate_cvv,
    validate_expiry,
};

const COLUMNS: &str = "id, card_type, masked_number, last_four, holder_name, expiry_month, expiry_year, currency, is_default, is_verified, status, created_at";

#[derive(Clone)]
pub struct PaymentMethodService {
    db_pool: SqlitePool,
}

impl PaymentMethodService {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// List a user's cards, default first
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PaymentMethod>, ServiceError> {
        let methods = sqlx::query_as(&format!(
            "SELECT {} FROM payment_methods WHERE user_id = ? ORDER BY is_default DESC, created_at ASC",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(methods)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<PaymentMethod, ServiceError> {
        sqlx::query_as(&format!(
            "SELECT {} FROM payment_methods WHERE id = ? AND user_id = ?",
            COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Payment method".to_string()))
    }

    /// Validate the card and store its masked form. The first card a user
    /// adds becomes the default.
    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, ServiceError> {
        if !validate_card_number(&req.card_number) {
            return Err(ServiceError::Validation("Invalid card number".to_string()));
        }
        let card_type = detect_card_type(&req.card_number).ok_or_else(|| {
            ServiceError::Validation("Only Visa and Mastercard are supported".to_string())
        })?;
        if req.holder_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Cardholder name is required".to_string(),
            ));
        }
        let today = Utc::now().date_naive();
        if !validate_expiry(req.expiry_month, req.expiry_year, today) {
            return Err(ServiceError::Validation(format!(
                "Expiry must be a valid month no earlier than {:02}/{}",
                today.month(),
                today.year()
            )));
        }
        if !validate_cvv(&req.cvv) {
            return Err(ServiceError::Validation(
                "CVV must be 3 or 4 digits".to_string(),
            ));
        }
        let billing_json = match &req.billing {
            Some(billing) => {
                billing
                    .validate()
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                Some(
                    serde_json::to_string(billing)
                        .map_err(|e| ServiceError::Validation(e.to_string()))?,
                )
            }
            None => None,
        };

        let mut tx = db::begin_write(&self.db_pool).await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_methods WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = existing == 0 || req.is_default;

        if is_default && existing > 0 {
            sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let method = PaymentMethod {
            id: Uuid::new_v4(),
            card_type,
            masked_number: mask_card_number(&req.card_number),
            last_four: last_four(&req.card_number),
            holder_name: req.holder_name.trim().to_string(),
            expiry_month: i64::from(req.expiry_month),
            expiry_year: i64::from(req.expiry_year),
            currency: req.currency,
            is_default,
            is_verified: false,
            status: PaymentMethodStatus::Active,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO payment_methods (id, user_id, card_type, masked_number, last_four, holder_name, expiry_month, expiry_year, currency, is_default, is_verified, status, billing_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(method.id)
        .bind(user_id)
        .bind(method.card_type)
        .bind(&method.masked_number)
        .bind(&method.last_four)
        .bind(&method.holder_name)
        .bind(method.expiry_month)
        .bind(method.expiry_year)
        .bind(method.currency)
        .bind(method.is_default)
        .bind(method.is_verified)
        .bind(method.status)
        .bind(billing_json)
        .bind(method.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            payment_method_id = %method.id,
            brand = %method.card_type,
            "Payment method added"
        );

        Ok(method)
    }
}
