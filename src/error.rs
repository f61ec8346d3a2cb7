// src/error.rs
// Centralized error taxonomy, rendered at the HTTP boundary as {"error": message}.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing or malformed request field (400).
    #[error("{0}")]
    Validation(String),

    /// Request named a value outside a closed set (400); carries the valid options.
    #[error("{message}")]
    InvalidOption {
        message: String,
        valid_options: Vec<String>,
    },

    /// Unknown art form, unknown or expired session, unknown image id (404).
    #[error("{0}")]
    NotFound(String),

    /// Lost a compare-and-swap against a concurrent session write (409).
    #[error("{0}")]
    Conflict(String),

    /// The generation provider rejected or failed a call; status forwarded when parseable.
    #[error("{message}")]
    Provider { message: String, status_code: u16 },

    /// Blob or document store failure (500).
    #[error("{0}")]
    Storage(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn provider(message: impl Into<String>, status_code: u16) -> Self {
        Self::Provider {
            message: message.into(),
            status_code,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidOption { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Provider { status_code, .. } => StatusCode::from_u16(*status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(format!("Database error: {err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("Serialization error: {err}"))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("File system error: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = match &self {
            Self::InvalidOption { valid_options, .. } => json!({
                "error": self.to_string(),
                "validOptions": valid_options,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for fallible operations surfaced over HTTP.
pub type ApiResult<T> = Result<T, ApiError>;
