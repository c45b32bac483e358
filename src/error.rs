//! Error types for Microblog
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Callers branch on the variant: existence (`NotFound`), input problems
/// (`Validation`), uniqueness (`Conflict`) and transient storage failures
/// (`StorageTimeout`, `Database`).
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body over the size limit (413)
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Uniqueness violation (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A storage call exceeded its deadline (504)
    #[error("Storage timeout during {0}")]
    StorageTimeout(&'static str),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error (500)
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::Conflict(_) => "conflict",
            AppError::StorageTimeout(_) => "storage_timeout",
            AppError::Database(_) => "database",
            AppError::Migration(_) => "migration",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Classify a write error, turning unique-constraint failures into `Conflict`.
    ///
    /// SQLite reports these as `UNIQUE constraint failed: users.username`;
    /// the column name is surfaced so callers can tell which field clashed.
    pub(crate) fn from_write(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                let message = db_error.message();
                let field = message
                    .rsplit_once('.')
                    .map(|(_, column)| column.trim())
                    .filter(|column| !column.is_empty())
                    .unwrap_or("value");
                return AppError::Conflict(format!("{field} already exists"));
            }
        }
        AppError::Database(error)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        // A missing route parameter is a routing bug, not bad input.
        if rejection.status().is_server_error() {
            return AppError::Internal(anyhow::anyhow!(rejection.body_text()));
        }
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::StorageTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            AppError::Database(_) | AppError::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
