//! Property catalog handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AdminUser;
use crate::error::ApiError;
use crate::property::{CreatePropertyRequest, Property, PropertyFilter, PropertyService};

/// GET /api/properties?status=open
pub async fn list_properties(
    State(service): State<Arc<PropertyService>>,
    Query(filter): Query<PropertyFilter>,
) -> Result<Json<Vec<Property>>, ApiError> {
    Ok(Json(service.list(filter.status).await?))
}

/// GET /api/properties/:id
pub async fn get_property(
    State(service): State<Arc<PropertyService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Property>, ApiError> {
    Ok(Json(service.get(id).await?))
}

/// POST /api/properties (admin)
pub async fn create_property(
    State(service): State<Arc<PropertyService>>,
    _admin: AdminUser,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<Property>), ApiError> {
    let property = service.create(req).await?;
    Ok((StatusCode::CREATED, Json(property)))
}
