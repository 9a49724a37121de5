//! Property catalog routes

use axum::{routing::get, Router};

use crate::handlers::properties;
use crate::state::AppState;

pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route("/api/properties/:id", get(properties::get_property))
}
