//! Error types for fedcore
//!
//! All errors in the engine are converted to `AppError`. The queue uses
//! [`AppError::is_retryable`] to decide between backoff and dead-lettering,
//! and the HTTP boundary uses the `IntoResponse` impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Engine-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unknown actor/object (404)
    #[error("Resource not found")]
    NotFound,

    /// Missing signature or credentials (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Signature did not verify against the sender's key (401)
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Malformed request or activity (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate handle or relation (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed key material (500)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Remote object could not be dereferenced (502)
    #[error("Remote object not fetchable: {0}")]
    NotFetchable(String),

    /// A single delivery to a peer failed (502)
    #[error("Delivery to {inbox} failed: {reason}")]
    TransientDelivery { inbox: String, reason: String },

    /// Some deliveries of a fan-out failed (502)
    #[error("Delivery incomplete: {delivered} delivered, {failed} failed")]
    PartialDelivery { delivered: usize, failed: usize },

    /// Activity document cannot be normalized (500, never retried)
    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the queue should schedule another attempt for a job that
    /// failed with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::HttpClient(_)
                | AppError::NotFetchable(_)
                | AppError::TransientDelivery { .. }
                | AppError::PartialDelivery { .. }
                | AppError::Internal(_)
        )
    }

    /// Short machine-readable label, used for metrics and JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::VerificationFailed => "verification_failed",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Crypto(_) => "crypto",
            AppError::NotFetchable(_) => "not_fetchable",
            AppError::TransientDelivery { .. } => "transient_delivery",
            AppError::PartialDelivery { .. } => "partial_delivery",
            AppError::Canonicalization(_) => "canonicalization",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Internal details (database, key material) are not echoed to peers.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFetchable(_)
            | AppError::TransientDelivery { .. }
            | AppError::PartialDelivery { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Crypto(_)
            | AppError::Canonicalization(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Crypto(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
