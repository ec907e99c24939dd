//! Server error taxonomy and its mapping to the HTTP error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use switchboard_types::ErrorModel;
use thiserror::Error;

/// Every failure a request or queue handler can surface.
///
/// Unknown event and frame kinds are *not* errors; they are logged and
/// ignored where they occur.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad bearer token or callback secret mismatch.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown session or phone number.
    #[error("{0}")]
    NotFound(String),

    /// Malformed request body; one string per violation.
    #[error("Validation error")]
    Validation(Vec<String>),

    /// Provider-side failure, propagated to the caller without retry.
    #[error("provider error: {0}")]
    Transient(String),

    /// Everything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Transient(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let model = match &self {
            AppError::Validation(violations) => {
                ErrorModel::new("Validation error", violations.clone())
            }
            other => ErrorModel::new(other.to_string(), Vec::new()),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, "request failed: {}", self);
        }
        (status, Json(model)).into_response()
    }
}

impl From<switchboard_db::StoreError> for AppError {
    fn from(e: switchboard_db::StoreError) -> Self {
        Self::Internal(format!("session store error: {e}"))
    }
}
