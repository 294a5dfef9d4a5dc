//! Route definitions for the gateway observatory API

use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::handlers::*;

// Gateway routes
pub fn gateway_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gateways", get(get_gateways))
        .route(
            "/api/gateways/refresh",
            axum::routing::post(refresh_gateways),
        )
}

// Metrics routes
pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/api/metrics", get(get_metrics))
}
