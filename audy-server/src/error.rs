//! Error types for audy-server
//!
//! Handlers return [`ApiResult`]; every error renders as
//! `{"error": {"code": ..., "message": ...}}` with a matching status.

use crate::services::batch::BatchError;
use crate::services::ingest::IngestError;
use crate::services::range::RangeError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No valid session (401)
    #[error("Not authenticated")]
    Unauthorized,

    /// Authenticated but not allowed (403)
    #[error("Forbidden")]
    Forbidden,

    /// Range start beyond end of file (416)
    #[error("Range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    /// Ingestion failure, reported with its key
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Batch upload could not start
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// audy-common error
    #[error("Common error: {0}")]
    Common(#[from] audy_common::Error),
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Malformed(header) => ApiError::BadRequest(format!("bad range {}", header)),
            RangeError::NotSatisfiable { size } => ApiError::RangeNotSatisfiable { size },
        }
    }
}

fn ingest_status(err: &IngestError) -> StatusCode {
    match err {
        IngestError::NotSupportedFormat => StatusCode::BAD_REQUEST,
        IngestError::Duplicate(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN".to_string()),
            ApiError::RangeNotSatisfiable { .. } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                "RANGE_NOT_SATISFIABLE".to_string(),
            ),
            ApiError::Ingest(err) => (ingest_status(err), err.key().to_ascii_uppercase()),
            ApiError::Batch(err) => {
                let status = match err {
                    BatchError::AlreadyRunning => StatusCode::CONFLICT,
                    BatchError::NoFiles => StatusCode::BAD_REQUEST,
                    BatchError::ReadDir(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.key().to_ascii_uppercase())
            }
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
            ),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR".to_string()),
            ApiError::Common(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = %error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        if let ApiError::RangeNotSatisfiable { size } = self {
            return (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
