//! # Order Status
//!
//! Fulfilment and payment state machines for self-service orders.
//!
//! ## Fulfilment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PendingConfirmation → Confirmed → Preparing → Shipping → Delivered →   │
//! │          │                 │           │           │        Completed   │
//! │          └─────────────────┴─────┬─────┴───────────┘                    │
//! │                                  ▼                                      │
//! │                       CancellationRequested                             │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                              Cancelled  (terminal, stock returned)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Who may do what
//! | Actor | Allowed |
//! |---|---|
//! | Customer (own order) | request cancellation before delivery; withdraw a request made while pending |
//! | Staff with full access, Admin | any status, subject to the structural rules |
//! | Anyone else | nothing |
//!
//! Structural rules bind everyone: no same-state moves, Cancelled is final,
//! cancellation is only reachable before delivery.
//!
//! ## Payment
//! `Unpaid → PartiallyPaid → Paid → Refunded`, forward only, staff only.
//! Refunded is terminal and needs money to have been received.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, OrderHistoryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    PendingConfirmation,
    Confirmed,
    Preparing,
    Shipping,
    Delivered,
    Completed,
    CancellationRequested,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::CancellationRequested => "cancellation_requested",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the normal progression. Side states have none.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::PendingConfirmation => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Shipping => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Completed => Some(5),
            OrderStatus::CancellationRequested | OrderStatus::Cancelled => None,
        }
    }

    /// Statuses from which cancellation can still be requested.
    pub fn is_before_delivery(&self) -> bool {
        matches!(self.rank(), Some(r) if r < 4)
    }

    pub fn is_terminal(&self) -> bool {
        *self == OrderStatus::Cancelled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Unpaid => 0,
            PaymentStatus::PartiallyPaid => 1,
            PaymentStatus::Paid => 2,
            PaymentStatus::Refunded => 3,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a status change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order is already {0}")]
    NoChange(String),

    #[error("{from} is final")]
    Terminal { from: String, to: String },

    #[error("{to} cannot be reached from {from}")]
    NotReachable { from: String, to: String },

    #[error("{0}")]
    Unauthorized(String),
}

impl From<TransitionError> for CoreError {
    fn from(err: TransitionError) -> Self {
        let reason = err.to_string();
        match err {
            TransitionError::Unauthorized(msg) => CoreError::Unauthorized(msg),
            TransitionError::NoChange(status) => CoreError::InvalidTransition {
                from: status.clone(),
                to: status,
                reason,
            },
            TransitionError::Terminal { from, to } | TransitionError::NotReachable { from, to } => {
                CoreError::InvalidTransition { from, to, reason }
            }
        }
    }
}

/// An accepted status change, ready to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Transition {
    /// Whether the order's items go back on the shelf.
    pub fn restocks(&self) -> bool {
        self.to == OrderStatus::Cancelled
    }

    /// The single history entry this transition appends.
    pub fn history_entry(
        &self,
        order_id: &str,
        seq: i64,
        actor: &Actor,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> OrderHistoryEntry {
        OrderHistoryEntry {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            seq,
            status: self.to,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            reason: reason.filter(|r| !r.trim().is_empty()),
            created_at: at,
        }
    }
}

/// Decides whether `actor` may move an order from `current` to `requested`.
///
/// `history` is the order's existing log in sequence order; it is consulted
/// when a customer withdraws a cancellation request.
pub fn transition(
    current: OrderStatus,
    requested: OrderStatus,
    actor: &Actor,
    is_owner: bool,
    history: &[OrderHistoryEntry],
) -> Result<Transition, TransitionError> {
    check_structure(current, requested)?;

    if actor.is_privileged() {
        return Ok(Transition {
            from: current,
            to: requested,
        });
    }

    if !is_owner {
        return Err(TransitionError::Unauthorized(
            "only the customer who placed the order or staff may change it".to_string(),
        ));
    }

    match requested {
        OrderStatus::CancellationRequested => Ok(Transition {
            from: current,
            to: requested,
        }),
        OrderStatus::PendingConfirmation
            if current == OrderStatus::CancellationRequested
                && status_before_last_request(history) == OrderStatus::PendingConfirmation =>
        {
            Ok(Transition {
                from: current,
                to: requested,
            })
        }
        _ => Err(TransitionError::Unauthorized(format!(
            "customers may not set an order to {}",
            requested
        ))),
    }
}

/// Decides a payment status change. Only privileged staff may make one.
pub fn payment_transition(
    current: PaymentStatus,
    requested: PaymentStatus,
    actor: &Actor,
) -> CoreResult<PaymentStatus> {
    if !actor.is_privileged() {
        return Err(CoreError::Unauthorized(
            "payment status is managed by staff".to_string(),
        ));
    }

    let refuse = |reason: &str| CoreError::InvalidTransition {
        from: current.to_string(),
        to: requested.to_string(),
        reason: reason.to_string(),
    };

    if current == requested {
        return Err(refuse("no change"));
    }
    if current == PaymentStatus::Refunded {
        return Err(refuse("refunded is final"));
    }
    if requested == PaymentStatus::Refunded && current == PaymentStatus::Unpaid {
        return Err(refuse("nothing has been paid"));
    }
    if requested.rank() < current.rank() {
        return Err(refuse("payment status only moves forward"));
    }

    Ok(requested)
}

fn check_structure(current: OrderStatus, requested: OrderStatus) -> Result<(), TransitionError> {
    if current == requested {
        return Err(TransitionError::NoChange(current.to_string()));
    }
    if current.is_terminal() {
        return Err(TransitionError::Terminal {
            from: current.to_string(),
            to: requested.to_string(),
        });
    }

    let reachable = match requested {
        OrderStatus::CancellationRequested => current.is_before_delivery(),
        OrderStatus::Cancelled => {
            current.is_before_delivery() || current == OrderStatus::CancellationRequested
        }
        _ => true,
    };

    if !reachable {
        return Err(TransitionError::NotReachable {
            from: current.to_string(),
            to: requested.to_string(),
        });
    }

    Ok(())
}

/// Status the order held when its latest cancellation request was made.
fn status_before_last_request(history: &[OrderHistoryEntry]) -> OrderStatus {
    let last_request = history
        .iter()
        .rposition(|e| e.status == OrderStatus::CancellationRequested);

    match last_request {
        Some(i) => history[..i]
            .last()
            .map(|e| e.status)
            .unwrap_or(OrderStatus::PendingConfirmation),
        None => OrderStatus::PendingConfirmation,
    }
}
