//! Error handling for the Cooperative Management Platform
//!
//! Every failure surfaces to clients as `{"error": {"code", "message", "field"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Missing price: {0}")]
    MissingPrice(String),

    #[error("Nothing to process: {0}")]
    NothingEligible(String),

    #[error("A cooperative must be selected with the X-Cooperative-Id header")]
    TenantRequired,

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Map a Postgres unique violation (23505) to `DuplicateEntry`, pass anything else through
    pub fn from_unique_violation(err: sqlx::Error, field: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::DuplicateEntry(field.to_string())
            }
            _ => AppError::DatabaseError(err),
        }
    }

    /// HTTP status and client-facing detail for this error
    pub fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        let detail = |code: &str, message: String, field: Option<String>| ErrorDetail {
            code: code.to_string(),
            message,
            field,
        };

        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                detail("INVALID_CREDENTIALS", "Invalid email or password".into(), None),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                detail("TOKEN_EXPIRED", "Token has expired".into(), None),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                detail("INVALID_TOKEN", "Invalid token".into(), None),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                detail(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action".into(),
                    None,
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                detail("UNAUTHORIZED", message.clone(), None),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                detail("VALIDATION_ERROR", message.clone(), Some(field.clone())),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                detail("VALIDATION_ERROR", msg.clone(), None),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                detail(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                    Some(field.clone()),
                ),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                detail("CONFLICT", message.clone(), Some(resource.clone())),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                detail("NOT_FOUND", format!("{} not found", resource), None),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail("INVALID_STATE_TRANSITION", msg.clone(), None),
            ),
            AppError::MissingPrice(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail("MISSING_PRICE", msg.clone(), None),
            ),
            AppError::NothingEligible(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail("NOTHING_ELIGIBLE", msg.clone(), None),
            ),
            AppError::TenantRequired => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail("TENANT_REQUIRED", self.to_string(), None),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("CONFIGURATION_ERROR", format!("Configuration error: {}", msg), None),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("DATABASE_ERROR", "A database error occurred".into(), None),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("INTERNAL_ERROR", msg.clone(), None),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("INTERNAL_ERROR", "An internal server error occurred".into(), None),
            ),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingPrice { .. } => AppError::MissingPrice(err.to_string()),
            DomainError::InvalidTransition { .. } => AppError::InvalidStateTransition(err.to_string()),
            DomainError::Invalid { field, message } => AppError::Validation {
                field: field.to_string(),
                message,
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::Validation {
                    field: field.to_string(),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(code = %error_detail.code, "request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
