//! # Order Repository
//!
//! Self-service orders: placement with the same atomicity as checkout, then
//! two independent status machines.
//!
//! ## Status Change Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. read order + history                                              │
//! │   2. order_status::transition(current, requested, actor, owner, hist)  │
//! │   3. UPDATE orders SET status = new WHERE id = ? AND status = current  │
//! │      └── 0 rows → VersionConflict (someone else moved it)              │
//! │   4. INSERT order_history (seq = last + 1)                             │
//! │   5. Cancelled? put every item back on the shelf                       │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Placing an order writes no history entry; the log holds transitions only,
//! so N accepted transitions always leave exactly N entries.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::checkout::price_order;
use petal_core::order_status::{payment_transition, transition};
use petal_core::validation::{validate_name, validate_phone, validate_required};
use petal_core::{
    Actor, CoreError, Order, OrderHistoryEntry, OrderItem, OrderStatus, PaymentStatus,
    PlaceOrderRequest,
};

use super::product::{decrement_in, increment_in, load_many};
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const ORDER_COLUMNS: &str = "id, customer_id, customer_name, customer_phone, shipping_address, \
     subtotal, shipping_fee, discount_code, discount_amount, total, status, payment_status, \
     note, created_at, updated_at";

/// Shop-wide pricing inputs for self-service orders.
#[derive(Debug, Clone, Default)]
pub struct OrderPricing {
    pub shipping_fee: i64,
    /// Discount code → amount in dong.
    pub discount_codes: HashMap<String, i64>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    ctx: RepoContext,
}

impl OrderRepository {
    pub fn new(ctx: RepoContext) -> Self {
        OrderRepository { ctx }
    }

    /// Places an order for `actor`, taking the stock off the shelf.
    pub async fn place(
        &self,
        request: &PlaceOrderRequest,
        actor: &Actor,
        pricing: &OrderPricing,
    ) -> DbResult<Order> {
        let customer_name = validate_name("customer name", &request.customer_name)?;
        let customer_phone = validate_phone(&request.customer_phone)?;
        let shipping_address = validate_required("shipping address", &request.shipping_address, 500)?;

        self.ctx
            .write("place_order", async {
                let mut tx = self.ctx.pool().begin().await?;

                let ids: Vec<&str> = request.lines.iter().map(|l| l.product_id.as_str()).collect();
                let products = load_many(&mut tx, ids).await?;
                let priced = price_order(
                    &request.lines,
                    &products,
                    pricing.shipping_fee,
                    request.discount_code.as_deref(),
                    &pricing.discount_codes,
                )?;

                let mut events = Vec::with_capacity(priced.lines.len() + 1);
                for line in &priced.lines {
                    decrement_in(&mut tx, &line.product_id, line.quantity).await?;
                    events.push(ChangeEvent::new(
                        Collection::Products,
                        &line.product_id,
                        ChangeKind::Updated,
                    ));
                }

                let now = Utc::now();
                let order_id = Uuid::new_v4().to_string();
                let items: Vec<OrderItem> = priced
                    .lines
                    .iter()
                    .map(|line| OrderItem {
                        id: Uuid::new_v4().to_string(),
                        order_id: order_id.clone(),
                        product_id: line.product_id.clone(),
                        name: line.name.clone(),
                        color: line.color.clone(),
                        size: line.size.clone(),
                        unit: line.unit.clone(),
                        unit_price: line.unit_price.amount(),
                        quantity: line.quantity,
                        line_total: line.line_total.amount(),
                    })
                    .collect();

                let order = Order {
                    id: order_id,
                    customer_id: actor.id.clone(),
                    customer_name: customer_name.clone(),
                    customer_phone: customer_phone.clone(),
                    shipping_address: shipping_address.clone(),
                    subtotal: priced.subtotal.amount(),
                    shipping_fee: priced.shipping_fee.amount(),
                    discount_code: priced.discount_code.clone(),
                    discount_amount: priced.discount_amount.amount(),
                    total: priced.total.amount(),
                    status: OrderStatus::PendingConfirmation,
                    payment_status: PaymentStatus::Unpaid,
                    note: request.note.clone().filter(|n| !n.trim().is_empty()),
                    created_at: now,
                    updated_at: now,
                    items,
                    history: Vec::new(),
                };

                insert_order_in(&mut tx, &order).await?;
                commit(tx).await?;

                info!(id = %order.id, customer = %order.customer_id, total = %priced.total, "Order placed");
                events.push(ChangeEvent::new(Collection::Orders, &order.id, ChangeKind::Created));
                Ok((order, events))
            })
            .await
    }

    /// Newest first, without items or history. `customer_id` narrows the
    /// list to one customer's orders.
    pub async fn list(&self, customer_id: Option<&str>) -> DbResult<Vec<Order>> {
        let orders = match customer_id {
            Some(customer_id) => {
                let sql = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Order>(&sql)
                    .bind(customer_id)
                    .fetch_all(self.ctx.pool())
                    .await?
            }
            None => {
                let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
                sqlx::query_as::<_, Order>(&sql)
                    .fetch_all(self.ctx.pool())
                    .await?
            }
        };
        Ok(orders)
    }

    /// An order with its items and full history.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Order> {
        let mut conn = self.ctx.pool().acquire().await?;
        load_full_in(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Moves an order to `requested` on behalf of `actor`, appending one
    /// history entry. Reaching Cancelled returns the items to stock.
    pub async fn apply_transition(
        &self,
        id: &str,
        requested: OrderStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> DbResult<Order> {
        self.ctx
            .write("order_transition", async {
                let mut tx = self.ctx.pool().begin().await?;

                let order = load_full_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Order", id))?;

                let accepted = transition(
                    order.status,
                    requested,
                    actor,
                    order.is_owned_by(actor),
                    &order.history,
                )
                .map_err(CoreError::from)?;

                let now = Utc::now();
                let result = sqlx::query(
                    "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                )
                .bind(accepted.to)
                .bind(now)
                .bind(id)
                .bind(accepted.from)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::conflict("Order", id));
                }

                let seq = order.history.last().map(|e| e.seq).unwrap_or(0) + 1;
                let entry = accepted.history_entry(id, seq, actor, reason.clone(), now);
                insert_history_in(&mut tx, &entry).await?;

                let mut events = vec![ChangeEvent::new(Collection::Orders, id, ChangeKind::Updated)];
                if accepted.restocks() {
                    for item in &order.items {
                        // a product deleted since the order was placed has nowhere to go back to
                        if increment_in(&mut tx, &item.product_id, item.quantity).await? {
                            events.push(ChangeEvent::new(
                                Collection::Products,
                                &item.product_id,
                                ChangeKind::Updated,
                            ));
                        }
                    }
                }

                let updated = load_full_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Order", id))?;
                commit(tx).await?;

                info!(
                    id,
                    from = %accepted.from,
                    to = %accepted.to,
                    actor = %actor.id,
                    seq,
                    "Order status changed"
                );
                Ok((updated, events))
            })
            .await
    }

    /// Changes the payment status. Staff only, forward only.
    pub async fn set_payment_status(
        &self,
        id: &str,
        requested: PaymentStatus,
        actor: &Actor,
    ) -> DbResult<Order> {
        self.ctx
            .write("order_payment_status", async {
                let mut tx = self.ctx.pool().begin().await?;

                let order = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Order", id))?;
                let next = payment_transition(order.payment_status, requested, actor)?;

                let result = sqlx::query(
                    "UPDATE orders SET payment_status = ?1, updated_at = ?2 \
                     WHERE id = ?3 AND payment_status = ?4",
                )
                .bind(next)
                .bind(Utc::now())
                .bind(id)
                .bind(order.payment_status)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::conflict("Order", id));
                }

                let updated = load_full_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Order", id))?;
                commit(tx).await?;

                info!(id, from = %order.payment_status, to = %next, "Payment status changed");
                Ok((updated, vec![ChangeEvent::new(Collection::Orders, id, ChangeKind::Updated)]))
            })
            .await
    }
}

async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order)
}

async fn load_full_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let Some(mut order) = fetch_in(conn, id).await? else {
        return Ok(None);
    };

    order.items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, name, color, size, unit, unit_price, quantity, line_total
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    order.history = sqlx::query_as::<_, OrderHistoryEntry>(
        r#"
        SELECT id, order_id, seq, status, actor_id, actor_name, reason, created_at
        FROM order_history
        WHERE order_id = ?1
        ORDER BY seq
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(order))
}

async fn insert_order_in(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, customer_name, customer_phone, shipping_address,
            subtotal, shipping_fee, discount_code, discount_amount, total,
            status, payment_status, note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(&order.discount_code)
    .bind(order.discount_amount)
    .bind(order.total)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, name, color, size, unit,
                unit_price, quantity, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(&item.color)
        .bind(&item.size)
        .bind(&item.unit)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_history_in(conn: &mut SqliteConnection, entry: &OrderHistoryEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_history (id, order_id, seq, status, actor_id, actor_name, reason, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.order_id)
    .bind(entry.seq)
    .bind(entry.status)
    .bind(&entry.actor_id)
    .bind(&entry.actor_name)
    .bind(&entry.reason)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
