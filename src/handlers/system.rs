//! Health and public client configuration

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::db;
use crate::state::{AppState, ClientConfig};

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::check_health(&state.db_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "database": "connected",
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "version": env!("CARGO_PKG_VERSION"),
                    "database": "unreachable",
                })),
            )
        }
    }
}

/// GET /api/config
pub async fn client_config(State(config): State<Arc<ClientConfig>>) -> Json<ClientConfig> {
    Json(config.as_ref().clone())
}
