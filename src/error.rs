//! Error types for BookShare server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL on unique constraint violations
pub const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE class of every integrity constraint violation
pub const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Application error codes returned in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    BadValue = 5,
    Duplicate = 6,
    AlreadyRequested = 7,
    SelfRequest = 8,
    AlreadyResolved = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write. Carries the storage message verbatim.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other integrity constraint (foreign key, check, not-null) rejected the write.
    #[error("Integrity constraint violated: {0}")]
    IntegrityViolation(String),

    #[error("You have already requested this book")]
    AlreadyRequested,

    #[error("You cannot request your own book")]
    SelfRequest,

    #[error("Request already {0}")]
    AlreadyResolved(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a sqlx error from an insert or update. Constraint violations keep
    /// the storage message so the caller sees why the write was refused.
    pub fn from_write(err: sqlx::Error) -> Self {
        let constraint = match &err {
            sqlx::Error::Database(db) => Self::from_constraint(db.code().as_deref(), db.message()),
            _ => None,
        };
        constraint.unwrap_or(AppError::Database(err))
    }

    /// Classify a SQLSTATE. `None` when it is not an integrity violation.
    pub fn from_constraint(code: Option<&str>, message: &str) -> Option<Self> {
        match code {
            Some(UNIQUE_VIOLATION) => Some(AppError::UniqueViolation(message.to_string())),
            Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => {
                Some(AppError::IntegrityViolation(message.to_string()))
            }
            _ => None,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        AppError::Validation(format!("Invalid or missing fields: {}", fields.join(", ")))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::UniqueViolation(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::IntegrityViolation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::AlreadyRequested => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyRequested, self.to_string())
            }
            AppError::SelfRequest => {
                (StatusCode::BAD_REQUEST, ErrorCode::SelfRequest, self.to_string())
            }
            AppError::AlreadyResolved(_) => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyResolved, self.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
