use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use infinod_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(super) fn map_core_error(err: CoreError) -> AppError {
    match err {
        CoreError::InvalidScanWindow { .. } => AppError::BadRequest(err.to_string()),
        other => AppError::Internal(other.to_string()),
    }
}
