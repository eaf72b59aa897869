use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid input, rejected before any write.
    #[error("{0}")]
    Validation(String),

    /// Referenced book or review does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Acting identity does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Uploaded image exceeds the configured size cap.
    #[error("Image exceeds the {0} byte upload limit")]
    TooLarge(usize),

    /// Image host call failed.
    #[error("Image upload failed: {0}")]
    Upload(String),

    /// Unexpected persistence failure.
    #[error("Store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable identifier of the failure kind, used in response payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::TooLarge(_) => "payload_too_large",
            AppError::Upload(_) => "upload_failed",
            AppError::Store(_) => "store",
            AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure originates on the server side.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Failure kind, see [`AppError::kind`].
    pub error: &'static str,
    /// Human readable message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store and internal details stay in the log.
        let message = match &self {
            AppError::Store(_) | AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        if self.is_server_fault() {
            tracing::error!(error = %self, kind = self.kind(), "Request error");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
