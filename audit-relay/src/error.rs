//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the connector
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration extraction error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Invalid envelope or request content. Raised synchronously, never
    /// retried, never persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique-constraint violation on the idempotency key
    #[error("Duplicate idempotency key: {0}")]
    DuplicateKey(String),

    /// Malformed JSON payload, or envelope serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message bus send failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbox table name failed the identifier pattern check. The name is
    /// interpolated into query text, so it is rejected before any queue
    /// statement is built.
    #[error("Invalid outbox table name: {0}")]
    InvalidTableName(String),
}

impl Error {
    /// Short machine-readable code for logs and HTTP bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DuplicateKey(_) => "DUPLICATE_KEY",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::InvalidTableName(_) => "INVALID_TABLE_NAME",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Machine-readable error code
    pub code: String,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status: status.as_u16(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::DuplicateKey(_) => StatusCode::CONFLICT,
            Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Storage(_) | Error::InvalidTableName(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let body = ErrorResponse::new(status, self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::DuplicateKey(db_err.to_string())
            }
            _ => Error::Storage(err.to_string()),
        }
    }
}
