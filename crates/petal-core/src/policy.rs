//! # Authorization Policy
//!
//! One function answers "may this actor do this?" for every mutation entry
//! point. Handlers call [`authorize`] once, before touching the store.
//!
//! ```text
//! ┌──────────────────────────────┬────────┬──────────────┬───────┬──────────┐
//! │ Action                       │ Admin  │ Staff (full) │ Staff │ Customer │
//! ├──────────────────────────────┼────────┼──────────────┼───────┼──────────┤
//! │ ViewCatalog, PlaceOrder      │   ✓    │      ✓       │   ✓   │    ✓     │
//! │ TransitionOrder (gate)       │   ✓    │      ✓       │   ✓   │    ✓     │
//! │ ViewRecords, Checkout        │   ✓    │      ✓       │   ✓   │          │
//! │ ManageProducts, ManageOptions│   ✓    │      ✓       │       │          │
//! │ RecordImport/Disposal, Debts │   ✓    │      ✓       │       │          │
//! │ ManageCustomers, Employees   │   ✓    │      ✓       │       │          │
//! │ SetPaymentStatus             │   ✓    │      ✓       │       │          │
//! │ ReviewAccessRequests         │   ✓    │              │       │          │
//! │ CreateEmployee               │   ✓    │              │       │          │
//! └──────────────────────────────┴────────┴──────────────┴───────┴──────────┘
//! ```
//!
//! `TransitionOrder` only turns away pending identities. Which status an
//! actor may set is decided per order by
//! [`order_status::transition`](crate::order_status::transition), since the
//! answer depends on ownership and current status.

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Browse products and attribute options.
    ViewCatalog,
    /// Submit a self-service order.
    PlaceOrder,
    /// Ask for an order status change.
    TransitionOrder,
    /// Read invoices, orders, debts, customers, employees and logs.
    ViewRecords,
    /// Record an in-person sale.
    Checkout,
    ManageProducts,
    ManageOptions,
    RecordImport,
    RecordDisposal,
    ManageDebts,
    ManageCustomers,
    ManageEmployees,
    SetPaymentStatus,
    ReviewAccessRequests,
    CreateEmployee,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ViewCatalog => "view catalog",
            Action::PlaceOrder => "place orders",
            Action::TransitionOrder => "change order status",
            Action::ViewRecords => "view records",
            Action::Checkout => "record sales",
            Action::ManageProducts => "manage products",
            Action::ManageOptions => "manage attribute options",
            Action::RecordImport => "record imports",
            Action::RecordDisposal => "record disposals",
            Action::ManageDebts => "manage debts",
            Action::ManageCustomers => "manage customers",
            Action::ManageEmployees => "manage employees",
            Action::SetPaymentStatus => "set payment status",
            Action::ReviewAccessRequests => "review access requests",
            Action::CreateEmployee => "create employee accounts",
        }
    }
}

/// Admins, and employees holding the full-access flag.
pub fn is_privileged(actor: &Actor) -> bool {
    actor.is_privileged()
}

/// Allows or denies `action` for `actor`.
///
/// ## Example
/// ```rust
/// use petal_core::policy::{authorize, Action};
/// use petal_core::{Actor, Role};
///
/// let clerk = Actor { id: "e-1".into(), name: "Hà".into(), role: Role::Employee, full_access: false };
/// assert!(authorize(&clerk, Action::Checkout).is_ok());
/// assert!(authorize(&clerk, Action::ManageProducts).is_err());
/// ```
pub fn authorize(actor: &Actor, action: Action) -> CoreResult<()> {
    let allowed = match action {
        Action::ViewCatalog | Action::PlaceOrder | Action::TransitionOrder => {
            actor.role != Role::Pending
        }
        Action::ViewRecords | Action::Checkout => actor.is_staff(),
        Action::ManageProducts
        | Action::ManageOptions
        | Action::RecordImport
        | Action::RecordDisposal
        | Action::ManageDebts
        | Action::ManageCustomers
        | Action::ManageEmployees
        | Action::SetPaymentStatus => is_privileged(actor),
        Action::ReviewAccessRequests | Action::CreateEmployee => actor.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::Unauthorized(format!(
            "{} may not {}",
            actor.role.as_str(),
            action.as_str()
        )))
    }
}
