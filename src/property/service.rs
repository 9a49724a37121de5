//! Property catalog queries

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use super::model::{CreatePropertyRequest, Property, PropertyStatus};
use crate::error::ServiceError;

const COLUMNS: &str = "id, title, location, price_per_token, total_tokens, available_tokens, expected_yield_bps, status, created_at";

pub struct PropertyService {
    db_pool: SqlitePool,
}

impl PropertyService {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self, status: Option<PropertyStatus>) -> Result<Vec<Property>, ServiceError> {
        let properties = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM properties WHERE status = ? ORDER BY created_at DESC",
                    COLUMNS
                ))
                .bind(status)
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM properties ORDER BY created_at DESC",
                    COLUMNS
                ))
                .fetch_all(&self.db_pool)
                .await?
            }
        };
        Ok(properties)
    }

    pub async fn get(&self, id: Uuid) -> Result<Property, ServiceError> {
        sqlx::query_as(&format!("SELECT {} FROM properties WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Property".to_string()))
    }

    /// List a new offering with all of its tokens available
    pub async fn create(&self, req: CreatePropertyRequest) -> Result<Property, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let property = Property {
            id: Uuid::new_v4(),
            title: req.title.trim().to_string(),
            location: req.location.trim().to_string(),
            price_per_token: req.price_per_token,
            total_tokens: req.total_tokens,
            available_tokens: req.total_tokens,
            expected_yield_bps: req.expected_yield_bps,
            status: PropertyStatus::Open,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO properties ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
        ))
        .bind(property.id)
        .bind(&property.title)
        .bind(&property.location)
        .bind(property.price_per_token)
        .bind(property.total_tokens)
        .bind(property.available_tokens)
        .bind(property.expected_yield_bps)
        .bind(property.status)
        .bind(property.created_at)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(property_id = %property.id, title = %property.title, "Property listed");

        Ok(property)
    }
}
