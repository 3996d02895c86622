//! # petal-core: Pure Business Logic for Petal
//!
//! This crate holds every business rule of the flower shop back office as
//! plain functions over plain data. It never touches the database or the
//! network; callers load records, ask this crate what should happen, and then
//! persist the answer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Petal Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Admin UI  /  Storefront UI  (external)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP + SSE                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    petal-server (axum)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ petal-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌─────────────┐ ┌──────────────┐   │   │
//! │  │   │  money   │ │ checkout │ │order_status │ │    policy    │   │   │
//! │  │   └──────────┘ └──────────┘ └─────────────┘ └──────────────┘   │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌─────────────┐                    │   │
//! │  │   │  types   │ │ taxonomy │ │ validation  │                    │   │
//! │  │   └──────────┘ └──────────┘ └─────────────┘                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    petal-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Invoice, Order, Debt, ...)
//! - [`money`] - Integer money in dong
//! - [`checkout`] - Cart pricing, stock sufficiency, discount caps, debt
//! - [`order_status`] - Order and payment status state machines
//! - [`policy`] - Centralised authorization
//! - [`taxonomy`] - Product attribute vocabularies
//! - [`validation`] - Field validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use petal_core::money::Money;
//!
//! let rose = Money::from_amount(10_000);
//! assert_eq!((rose * 3).to_string(), "30.000 ₫");
//! ```

pub mod checkout;
pub mod error;
pub mod money;
pub mod order_status;
pub mod policy;
pub mod taxonomy;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order_status::{OrderStatus, PaymentStatus};
pub use taxonomy::{AttributeKind, AttributeOption, OptionDeletionPolicy};
pub use types::*;

/// Maximum number of distinct lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Wholesale orders of stems run into the thousands, so the cap is generous;
/// it exists to catch typing mistakes, not to limit real sales.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest single money amount accepted from a form or request (100 billion ₫).
///
/// With `MAX_ITEM_QUANTITY` and `MAX_CART_LINES` this keeps every cart total
/// well inside `i64`.
pub const MAX_AMOUNT: i64 = 100_000_000_000;

/// Upload size cap for product and customer images (5 MB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
