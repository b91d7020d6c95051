//! Error types and handling
//!
//! `AppError` is what handlers return; every variant maps to a status code and a
//! consistent JSON body. `IntegrationError` covers calls to external services
//! (generation API, workflow webhooks, publish targets) so callers never see raw
//! transport errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - authentication required (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict - resource already exists or state conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity - validation failed (422)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// External service failure (502)
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),
}

/// Failures talking to external services
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegrationError {
    /// The generation API could not be reached or answered with an error status
    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// A webhook could not be delivered or was rejected by the receiver
    #[error("Webhook delivery failed: {0}")]
    WebhookDeliveryFailed(String),

    /// The shared secret could not be used as an HMAC key
    #[error("Signature computation failed: {0}")]
    SignatureComputationError(String),

    /// The remote service answered with a body we cannot use
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },

    /// The integration has no configuration
    #[error("{0} is not configured")]
    NotConfigured(String),
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, should_log) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", false),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", false),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", false),
            AppError::ValidationError(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", false)
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", true),
            AppError::Integration(IntegrationError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", false)
            }
            AppError::Integration(_) => (StatusCode::BAD_GATEWAY, "integration_error", true),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", true),
        };

        if should_log {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let body = ErrorResponse::new(error_type, self.to_string());

        (status, Json(body)).into_response()
    }
}

// Conversions from common error types

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Services wrap typed errors in anyhow context; surface them again
        if let Some(app) = err.downcast_ref::<ServiceError>() {
            return app.clone().into();
        }
        if let Some(integration) = err.downcast_ref::<IntegrationError>() {
            return AppError::Integration(integration.clone());
        }
        AppError::Internal(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.message().contains("UNIQUE constraint failed") {
                    AppError::Conflict("Resource already exists".to_string())
                } else {
                    AppError::Database(db_err.to_string())
                }
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Domain rule violations raised from services through `anyhow`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            ServiceError::InvalidTransition(msg) => AppError::Conflict(msg),
            ServiceError::Invalid(msg) => AppError::BadRequest(msg),
            ServiceError::Unauthorized(msg) => AppError::Unauthorized(msg),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
