//! Error types for pond-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pond_engine::PondError;
use pond_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Bootstrap of the pond failed
    #[error("Pond error: {0}")]
    Pond(#[from] PondError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request exceeded its time budget; safe to retry
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT", true),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PondError> for ApiError {
    fn from(err: PondError) -> Self {
        match err {
            PondError::Validation(reason) => ApiError::BadRequest(reason),
            PondError::Storage(StorageError::Timeout(reason)) => ApiError::Timeout(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
