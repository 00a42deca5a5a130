//! Error handling module for the question bank backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const DUPLICATE: &str = "DUPLICATE";
    pub const DATASTORE_UNAVAILABLE: &str = "DATASTORE_UNAVAILABLE";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Kind of transient datastore failure. Both kinds are retried identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreFailure {
    /// The call did not complete within the configured timeout
    Timeout,
    /// The pool or connection could not serve the call
    Unavailable,
}

impl DatastoreFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatastoreFailure::Timeout => "timeout",
            DatastoreFailure::Unavailable => "unavailable",
        }
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Topic or question id did not resolve
    NotFound(String),
    /// Missing or blank required field
    Validation(String),
    /// Question text or topic name collision
    Duplicate(String),
    /// Timeout or connection failure, eligible for retry
    DatastoreTransient {
        kind: DatastoreFailure,
        message: String,
    },
    /// Non-transient database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::DatastoreTransient { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Duplicate(_) => codes::DUPLICATE,
            AppError::DatastoreTransient { .. } => codes::DATASTORE_UNAVAILABLE,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Duplicate(msg) => msg.clone(),
            AppError::DatastoreTransient { message, .. } => message.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    /// Whether a retry of the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::DatastoreTransient { .. })
    }

    pub fn topic_not_found() -> Self {
        AppError::NotFound("Topic not found".to_string())
    }

    pub fn question_not_found() -> Self {
        AppError::NotFound("Question not found".to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match &err {
            sqlx::Error::PoolTimedOut => AppError::DatastoreTransient {
                kind: DatastoreFailure::Timeout,
                message: format!("Datastore timeout: {}", err),
            },
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                AppError::DatastoreTransient {
                    kind: DatastoreFailure::Unavailable,
                    message: format!("Datastore unavailable: {}", err),
                }
            }
            // SQLITE_BUSY / SQLITE_LOCKED
            sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("5") | Some("6")) => {
                AppError::DatastoreTransient {
                    kind: DatastoreFailure::Unavailable,
                    message: format!("Datastore busy: {}", err),
                }
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        // Unknown failures surface with a generic message; details stay in the logs.
        let message = match error {
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.message(),
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
