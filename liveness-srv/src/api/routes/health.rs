//! Health check routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{HealthResponse, RemoteHealthResponse};
use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/remote", get(remote_check))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Verifies the remote analysis service is reachable with the configured credentials.
async fn remote_check(State(state): State<AppState>) -> ApiResult<Json<RemoteHealthResponse>> {
    let result = state
        .liveness_service
        .check_connectivity()
        .await
        .map_err(|e| ApiError::from(e).context("Remote connectivity error"))?;

    Ok(Json(RemoteHealthResponse {
        message: "Remote connectivity successful".to_string(),
        result,
    }))
}
