//! Liveness session routes.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    CreateSessionResponse, SessionResultResponse, StartStreamingRequest, StartStreamingResponse,
};
use crate::api::server::AppState;

/// Create the sessions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/stream", post(start_streaming))
        .route("/{id}/result", get(get_result))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<Json<CreateSessionResponse>> {
    let session = state
        .liveness_service
        .create_session()
        .await
        .map_err(|e| ApiError::from(e).context("Failed to create liveness session"))?;
    Ok(Json(session.into()))
}

/// Streams the recorded challenge and returns the remote service's response.
///
/// The stream runs under a child of the shutdown token and is cancelled when this
/// handler's future is dropped, which is what happens when the client disconnects.
async fn start_streaming(
    State(state): State<AppState>,
    payload: Result<Json<StartStreamingRequest>, JsonRejection>,
) -> ApiResult<Json<StartStreamingResponse>> {
    let Json(request) = payload?;
    let submission = request
        .into_submission()
        .map_err(|e| ApiError::from(e).context("Missing required fields"))?;

    let cancel_token = state.shutdown_token.child_token();
    let _guard = cancel_token.clone().drop_guard();

    let result = state
        .liveness_service
        .start_streaming(submission, cancel_token)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to start liveness streaming"))?;
    Ok(Json(result.into()))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResultResponse>> {
    let report = state
        .liveness_service
        .result(&id)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to fetch liveness results"))?;
    Ok(Json(report.into()))
}
