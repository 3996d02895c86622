//! # Error Types
//!
//! Domain-specific error types for petal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  petal-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule and authorization failures        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  petal-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures, timeouts, wrapped CoreError    │
//! │                                                                         │
//! │  petal-server errors                                                   │
//! │  └── ApiError         - What clients see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is raised before anything is written, so a caller that
//! receives one knows the store is untouched.

use thiserror::Error;

/// Business rule and authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Requested quantity exceeds what is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: Lily × 10
    ///      │
    ///      ▼
    /// Stock check: Lily has 4
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Lily", available: 4, requested: 10 }
    ///      │
    ///      ▼
    /// Nothing written, stock stays 4
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A line discount is above the product's per-unit cap times quantity.
    #[error("Discount {requested} for {product} exceeds the allowed maximum {max}")]
    DiscountExceedsCap {
        product: String,
        max: i64,
        requested: i64,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The payment method settles in full but the amount paid is short.
    #[error("{method} payments must cover the total: paid {paid}, total {total}")]
    PartialPaymentNotAllowed {
        method: String,
        paid: i64,
        total: i64,
    },

    #[error("Unknown discount code: {0}")]
    UnknownDiscountCode(String),

    /// The state machine refuses this move regardless of who asks.
    #[error("Cannot move from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// The actor is not allowed to perform the action.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Attribute option is referenced by products and the policy blocks deletion.
    #[error("{kind} option '{value}' is used by {count} product(s)")]
    OptionInUse {
        kind: String,
        value: String,
        count: i64,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Whether the error is an authorization failure rather than a rule violation.
    pub fn is_authorization(&self) -> bool {
        matches!(self, CoreError::Unauthorized(_))
    }
}

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A computed amount left the representable range.
    #[error("{field} is too large")]
    Overflow { field: String },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
