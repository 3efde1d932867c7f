//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type, `IntoResponse`-able the way `buildit_api::error::ApiError`
/// is — one variant per HTTP status family, `From` conversions from the
/// lower crates' errors so route handlers can use `?` throughout.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<docugen_core::Error> for ApiError {
    fn from(err: docugen_core::Error) -> Self {
        match err {
            docugen_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            docugen_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            docugen_core::Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<docugen_db::DbError> for ApiError {
    fn from(err: docugen_db::DbError) -> Self {
        match err {
            docugen_db::DbError::NotFound(msg) => ApiError::NotFound(msg),
            docugen_db::DbError::Duplicate(msg) | docugen_db::DbError::Conflict(msg) => {
                ApiError::Conflict(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<docugen_queue::QueueError> for ApiError {
    fn from(err: docugen_queue::QueueError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
