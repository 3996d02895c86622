//! # Domain Types
//!
//! Records owned by the store and the request shapes that create them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │     Order       │       │
//! │  │  quantity ≥ 0   │──►│  InvoiceItem[]  │   │  OrderItem[]    │       │
//! │  │  sell / cost    │   │  (snapshots)    │   │  history[]      │       │
//! │  │  version        │   │  debt_amount    │   │  status/payment │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │          ▲                      │ underpaid                             │
//! │          │ import               ▼                                       │
//! │  ┌───────┴─────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ImportReceipt   │──►│      Debt       │   │ DisposalLogEntry│       │
//! │  │ (supplier)      │   │ paid / unpaid   │   │ (append-only)   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Customer · Employee · AccessRequest · AttributeOption · Identity      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Invoice, order, import and disposal lines copy the product's name and
//! attributes at the time of the event. Later edits to the product never
//! rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::order_status::{OrderStatus, PaymentStatus};

// =============================================================================
// Actors and Identities
// =============================================================================

/// Role stored against an authentication identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    /// Signed up, access request not yet approved.
    Pending,
    Customer,
    Employee,
    /// The admin marker checked by privileged identity operations.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pending => "pending",
            Role::Customer => "customer",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }
}

/// Whoever is performing a mutation. Built by the server from a verified
/// bearer credential and the identity's stored role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// Employee flag granting the same mutation rights as an admin,
    /// except identity management.
    pub full_access: bool,
}

impl Actor {
    /// Staff with full access rights (admins always have them).
    pub fn is_privileged(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Employee => self.full_access,
            Role::Customer | Role::Pending => false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Employee | Role::Admin)
    }
}

/// An authentication identity. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A stock-keeping product: one flower in one color, quality, size and unit.
///
/// ## Invariants
/// - `quantity` never goes below zero (guarded by every decrement and by a
///   CHECK constraint in the store)
/// - `version` increases on every write; updates carry the version they read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub color: String,
    pub quality: String,
    pub size: String,
    pub unit: String,
    /// Quantity on hand.
    pub quantity: i64,
    pub sell_price: i64,
    pub cost_price: i64,
    /// Per-unit discount ceiling. `None` means no discount is allowed.
    pub max_discount_per_unit: Option<i64>,
    pub image_url: Option<String>,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_amount(self.sell_price)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_amount(self.cost_price)
    }

    /// Largest discount allowed on a line of `quantity` units.
    pub fn discount_cap(&self, quantity: i64) -> Money {
        Money::from_amount(self.max_discount_per_unit.unwrap_or(0)).multiply_quantity(quantity)
    }

    pub fn can_fulfil(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }

    /// Human label used in error messages and snapshots, e.g. "Rose (red, 60cm)".
    pub fn label(&self) -> String {
        let attrs: Vec<&str> = [self.color.as_str(), self.size.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if attrs.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, attrs.join(", "))
        }
    }
}

/// Product fields entered on the admin product form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub quantity: i64,
    pub sell_price: i64,
    pub cost_price: i64,
    #[serde(default)]
    pub max_discount_per_unit: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    /// Card terminals charge the full amount or nothing.
    Card,
}

impl PaymentMethod {
    /// Whether a sale may be recorded with less than the total paid,
    /// leaving the remainder as customer debt.
    pub fn permits_partial_payment(&self) -> bool {
        match self {
            PaymentMethod::Cash | PaymentMethod::BankTransfer => true,
            PaymentMethod::Card => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
        }
    }
}

// =============================================================================
// Cart and Invoice
// =============================================================================

/// One line of a checkout cart as submitted by the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Price charged per unit. Defaults to the product's sell price.
    #[serde(default)]
    pub unit_price: Option<i64>,
    /// Discount on the whole line, capped by the product's per-unit maximum.
    #[serde(default)]
    pub discount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            unit_price: None,
            discount: 0,
            note: None,
        }
    }
}

/// In-person sale submitted at the till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub customer_name: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub overall_discount: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid: i64,
}

/// Snapshot of one sold line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub discount: i64,
    pub note: Option<String>,
    /// unit_price × quantity − discount
    pub line_total: i64,
}

/// A finalized in-person sale. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub customer_name: String,
    pub customer_id: Option<String>,
    pub subtotal: i64,
    pub items_discount: i64,
    pub overall_discount: i64,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid: i64,
    pub debt_amount: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_amount(self.total)
    }

    pub fn has_debt(&self) -> bool {
        self.debt_amount > 0
    }
}

// =============================================================================
// Customer Orders
// =============================================================================

/// One line of a self-service order. Price is always taken from the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlaceOrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    /// Price at the time the order was placed.
    pub unit_price: i64,
    pub quantity: i64,
    pub line_total: i64,
}

/// One accepted status transition. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderHistoryEntry {
    pub id: String,
    pub order_id: String,
    /// Position in the order's history, starting at 1.
    pub seq: i64,
    pub status: OrderStatus,
    pub actor_id: String,
    pub actor_name: String,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A customer-initiated purchase with fulfilment and payment lifecycles.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<OrderItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub history: Vec<OrderHistoryEntry>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_amount(self.total)
    }

    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        self.customer_id == actor.id
    }
}

// =============================================================================
// Debt Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CounterpartyKind {
    /// The shop owes a supplier (stock bought on credit).
    Supplier,
    /// A customer owes the shop (underpaid invoice).
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DebtStatus {
    Unpaid,
    Paid,
}

impl DebtStatus {
    pub fn toggled(self) -> Self {
        match self {
            DebtStatus::Unpaid => DebtStatus::Paid,
            DebtStatus::Paid => DebtStatus::Unpaid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub counterparty_kind: CounterpartyKind,
    pub counterparty_name: String,
    pub counterparty_id: Option<String>,
    pub amount: i64,
    pub status: DebtStatus,
    /// Invoice or import receipt that gave rise to the debt.
    pub source: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewDebt {
    pub counterparty_kind: CounterpartyKind,
    pub counterparty_name: String,
    #[serde(default)]
    pub counterparty_id: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Date the debt was incurred; defaults to now.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Purchasing
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: i64,
}

/// Stock received from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportRequest {
    pub supplier_name: String,
    pub lines: Vec<ImportLine>,
    pub amount_paid: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportItem {
    pub id: String,
    pub import_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportReceipt {
    pub id: String,
    pub supplier_name: String,
    pub total_cost: i64,
    pub amount_paid: i64,
    pub debt_amount: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<ImportItem>,
}

// =============================================================================
// Disposal
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DisposalRequest {
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
}

/// Inventory write-off. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DisposalLogEntry {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub reason: String,
    pub actor_id: String,
    pub actor_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// People
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub identity_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub zalo_name: Option<String>,
    pub image_url: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub zalo_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Employee {
    pub id: String,
    pub identity_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub zalo_name: Option<String>,
    pub full_access: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmployeeInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    #[serde(default)]
    pub zalo_name: Option<String>,
    #[serde(default)]
    pub full_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RequestedRole {
    Customer,
    Employee,
}

impl RequestedRole {
    pub fn role(&self) -> Role {
        match self {
            RequestedRole::Customer => Role::Customer,
            RequestedRole::Employee => Role::Employee,
        }
    }
}

/// A pending registration. Its existence means "pending"; approval or
/// rejection deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessRequest {
    pub id: String,
    pub identity_id: Option<String>,
    pub requested_role: RequestedRole,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub position: Option<String>,
    pub zalo_name: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessRequestInput {
    pub requested_role: RequestedRole,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub zalo_name: Option<String>,
}

/// Outcome of approving an access request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", tag = "kind", content = "record")]
#[ts(export)]
pub enum ApprovedRecord {
    Customer(Customer),
    Employee(Employee),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, full_access: bool) -> Actor {
        Actor {
            id: "a-1".into(),
            name: "An".into(),
            role,
            full_access,
        }
    }

    #[test]
    fn test_privilege_levels() {
        assert!(actor(Role::Admin, false).is_privileged());
        assert!(actor(Role::Employee, true).is_privileged());
        assert!(!actor(Role::Employee, false).is_privileged());
        assert!(!actor(Role::Customer, true).is_privileged());
        assert!(!actor(Role::Pending, false).is_staff());
    }

    #[test]
    fn test_payment_method_partial_rules() {
        assert!(PaymentMethod::Cash.permits_partial_payment());
        assert!(PaymentMethod::BankTransfer.permits_partial_payment());
        assert!(!PaymentMethod::Card.permits_partial_payment());
    }

    #[test]
    fn test_debt_status_toggle() {
        assert_eq!(DebtStatus::Unpaid.toggled(), DebtStatus::Paid);
        assert_eq!(DebtStatus::Paid.toggled(), DebtStatus::Unpaid);
    }

    #[test]
    fn test_cart_line_defaults_from_json() {
        let line: CartLine =
            serde_json::from_str(r#"{"productId":"p-1","quantity":3}"#).unwrap();
        assert_eq!(line, CartLine::new("p-1", 3));
    }
}
