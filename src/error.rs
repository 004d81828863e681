//! Error handling for camrelay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upstream camera unreachable (transient, never fatal to the loop)
    #[error("Camera unreachable: {0}")]
    Unreachable(String),

    /// Payload received but not a decodable image (transient)
    #[error("Frame decode failed: {0}")]
    DecodeFailure(String),

    /// Classifier failed on a structurally valid frame
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// External notification sender failed
    #[error("Notification error: {0}")]
    Notify(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Unreachable(msg) => (StatusCode::BAD_GATEWAY, "CAMERA_UNREACHABLE", msg.clone()),
            Error::DecodeFailure(msg) => (StatusCode::BAD_GATEWAY, "DECODE_FAILURE", msg.clone()),
            Error::Classifier(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CLASSIFIER_ERROR",
                msg.clone(),
            ),
            Error::Notify(msg) => (StatusCode::BAD_GATEWAY, "NOTIFY_ERROR", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
