//! # API Endpoint Handlers

use super::{
    AppState,
    types::{ErrorResponse, HealthResponse, StatusResponse},
};
use crate::dispatch::Invocation;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Record counts per relation.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = StatusResponse::from(state.kernel.as_ref());
    (StatusCode::OK, Json(response))
}

// =============================================================================
// INVOKE HANDLER
// =============================================================================

/// Execute one action.
///
/// Domain failures come back as `200` with the failure variant in `output`.
/// A body that is not a known invocation is `400`; a kernel abort is `500`.
pub async fn invoke_handler(
    State(state): State<AppState>,
    payload: Result<Json<Invocation>, JsonRejection>,
) -> Response {
    let invocation = match payload {
        Ok(Json(invocation)) => invocation,
        Err(rejection) => {
            tracing::debug!("Rejected invocation body: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!(
                    "Invalid invocation: {}",
                    rejection.body_text()
                ))),
            )
                .into_response();
        }
    };

    match state.kernel.invoke(invocation) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!("Invocation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
