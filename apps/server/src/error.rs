//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Petal                                  │
//! │                                                                         │
//! │  Handler: ApiResult<T>                                                  │
//! │     │                                                                   │
//! │     ├── ValidationError ──────────────► 400 VALIDATION_ERROR            │
//! │     ├── no / bad bearer ──────────────► 401 UNAUTHENTICATED             │
//! │     ├── CoreError::Unauthorized ──────► 403 FORBIDDEN                   │
//! │     ├── DbError::NotFound ────────────► 404 NOT_FOUND                   │
//! │     ├── duplicate / stale version ────► 409 CONFLICT                    │
//! │     ├── stock, caps, transitions ─────► 422 BUSINESS_RULE | ...         │
//! │     ├── secret unconfigured ──────────► 503 UNAVAILABLE                 │
//! │     ├── DbError::Timeout ─────────────► 504 TIMEOUT (retryable)         │
//! │     └── anything else ────────────────► 500 DATABASE_ERROR | INTERNAL   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The body is always `{ "code": "...", "message": "..." }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use petal_core::{CoreError, ValidationError};
use petal_db::DbError;

/// Error returned from every handler.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Lily (white, 70cm): available 4, requested 10"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Missing, malformed or expired credential (401)
    Unauthenticated,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// Resource not found (404)
    NotFound,

    /// Duplicate or concurrently modified record (409)
    Conflict,

    /// Business rule rejected the request (422)
    BusinessRule,

    /// Requested more than is on hand (422)
    InsufficientStock,

    /// Deployment misconfiguration (503)
    Unavailable,

    /// Write did not finish in time and was rolled back (504)
    Timeout,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::BusinessRule | ErrorCode::InsufficientStock => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(e) => e.into(),
            CoreError::Unauthorized(_) => ApiError::forbidden(message),
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. } => ApiError::validation(message),
            CoreError::DiscountExceedsCap { .. }
            | CoreError::PartialPaymentNotAllowed { .. }
            | CoreError::UnknownDiscountCode(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::OptionInUse { .. } => ApiError::new(ErrorCode::BusinessRule, message),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rule(e) => e.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { .. } | DbError::VersionConflict { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }
            DbError::Timeout { .. } | DbError::CommitUnconfirmed { .. } => {
                ApiError::new(ErrorCode::Timeout, err.to_string())
            }
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                ApiError::unavailable("Database unavailable")
            }
            DbError::MigrationFailed(e) | DbError::QueryFailed(e) | DbError::Internal(e) => {
                // log the real cause, return a generic message
                error!("Database operation failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
