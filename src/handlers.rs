//! API handlers for the gateway observatory

use axum::{extract::State, http::StatusCode, Json};

use crate::app_state::AppState;
use crate::error::PipelineError;
use crate::models::{ApiResponse, GatewaySnapshot};
use crate::services::metrics::{compute_metrics, NetworkMetrics};

/// Latest gateway snapshot, running the pipeline first when none exists.
pub async fn get_gateways(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<GatewaySnapshot>>, (StatusCode, Json<ApiResponse<GatewaySnapshot>>)> {
    match state.snapshot_or_refresh().await {
        Ok(snapshot) => Ok(Json(ApiResponse {
            success: true,
            data: Some(snapshot),
            error: None,
        })),
        Err(err) => Err(pipeline_failure(err)),
    }
}

/// Explicit re-run of the pipeline, replacing the published snapshot.
pub async fn refresh_gateways(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<GatewaySnapshot>>, (StatusCode, Json<ApiResponse<GatewaySnapshot>>)> {
    match state.refresh().await {
        Ok(snapshot) => Ok(Json(ApiResponse {
            success: true,
            data: Some(snapshot),
            error: None,
        })),
        Err(err) => Err(pipeline_failure(err)),
    }
}

/// Decentralization metrics over the latest snapshot.
pub async fn get_metrics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NetworkMetrics>>, (StatusCode, Json<ApiResponse<NetworkMetrics>>)> {
    match state.snapshot_or_refresh().await {
        Ok(snapshot) => Ok(Json(ApiResponse {
            success: true,
            data: Some(compute_metrics(&snapshot.gateways)),
            error: None,
        })),
        Err(err) => Err(pipeline_failure(err)),
    }
}

/// List acquisition is the only failure that surfaces; it is retryable
/// by calling the endpoint again.
fn pipeline_failure<T>(err: PipelineError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match err {
        PipelineError::ListFetch(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };
    tracing::error!(error = %err, "pipeline run failed");
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
}
