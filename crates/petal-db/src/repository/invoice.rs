//! # Invoice Repository
//!
//! In-person checkout and invoice history.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. read every product in the cart          (inside the tx)           │
//! │   2. price_cart: stock, caps, totals, debt   (no writes yet)           │
//! │   3. guarded decrement per line              (quantity >= n)           │
//! │   4. INSERT invoice + invoice_items                                    │
//! │   5. INSERT customer debt if underpaid                                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure between BEGIN and COMMIT drops the transaction, which     │
//! │  rolls back every decrement already applied. No partial sale exists.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::checkout::{price_cart, validate_checkout_request};
use petal_core::{Actor, CheckoutRequest, CounterpartyKind, Invoice, InvoiceItem, NewDebt};

use super::debt::insert_debt_in;
use super::product::{decrement_in, load_many};
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const INVOICE_COLUMNS: &str = "id, customer_name, customer_id, subtotal, items_discount, \
     overall_discount, total, payment_method, amount_paid, debt_amount, created_by, created_at";

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    ctx: RepoContext,
}

impl InvoiceRepository {
    pub fn new(ctx: RepoContext) -> Self {
        InvoiceRepository { ctx }
    }

    /// Records a sale: invoice, stock decrements and customer debt commit
    /// together or not at all.
    pub async fn checkout(&self, request: &CheckoutRequest, actor: &Actor) -> DbResult<Invoice> {
        validate_checkout_request(request)?;

        self.ctx
            .write("checkout", async {
                let mut tx = self.ctx.pool().begin().await?;

                let ids: Vec<&str> = request.lines.iter().map(|l| l.product_id.as_str()).collect();
                let products = load_many(&mut tx, ids).await?;
                let priced = price_cart(
                    &request.lines,
                    &products,
                    request.overall_discount,
                    request.payment_method,
                    request.amount_paid,
                )?;

                let mut events = Vec::with_capacity(priced.lines.len() + 2);
                for line in &priced.lines {
                    decrement_in(&mut tx, &line.product_id, line.quantity).await?;
                    events.push(ChangeEvent::new(
                        Collection::Products,
                        &line.product_id,
                        ChangeKind::Updated,
                    ));
                }

                let invoice_id = Uuid::new_v4().to_string();
                let items: Vec<InvoiceItem> = priced
                    .lines
                    .iter()
                    .map(|line| InvoiceItem {
                        id: Uuid::new_v4().to_string(),
                        invoice_id: invoice_id.clone(),
                        product_id: line.product_id.clone(),
                        name: line.name.clone(),
                        color: line.color.clone(),
                        size: line.size.clone(),
                        unit: line.unit.clone(),
                        unit_price: line.unit_price.amount(),
                        quantity: line.quantity,
                        discount: line.discount.amount(),
                        note: line.note.clone(),
                        line_total: line.line_total.amount(),
                    })
                    .collect();

                let invoice = Invoice {
                    id: invoice_id,
                    customer_name: request.customer_name.trim().to_string(),
                    customer_id: request.customer_id.clone(),
                    subtotal: priced.subtotal.amount(),
                    items_discount: priced.items_discount.amount(),
                    overall_discount: priced.overall_discount.amount(),
                    total: priced.total.amount(),
                    payment_method: request.payment_method,
                    amount_paid: priced.amount_paid.amount(),
                    debt_amount: priced.debt.amount(),
                    created_by: actor.id.clone(),
                    created_at: Utc::now(),
                    items,
                };

                insert_invoice_in(&mut tx, &invoice).await?;
                events.push(ChangeEvent::new(
                    Collection::Invoices,
                    &invoice.id,
                    ChangeKind::Created,
                ));

                if invoice.has_debt() {
                    let debt = insert_debt_in(
                        &mut tx,
                        &NewDebt {
                            counterparty_kind: CounterpartyKind::Customer,
                            counterparty_name: invoice.customer_name.clone(),
                            counterparty_id: invoice.customer_id.clone(),
                            amount: invoice.debt_amount,
                            source: Some(invoice.id.clone()),
                            note: None,
                            created_at: Some(invoice.created_at),
                        },
                    )
                    .await?;
                    events.push(ChangeEvent::new(Collection::Debts, &debt.id, ChangeKind::Created));
                }

                commit(tx).await?;

                info!(
                    id = %invoice.id,
                    total = %priced.total,
                    debt = %priced.debt,
                    lines = invoice.items.len(),
                    "Checkout committed"
                );
                Ok((invoice, events))
            })
            .await
    }

    /// Most recent invoices first, without items.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY created_at DESC LIMIT ?1"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(limit)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(invoices)
    }

    /// An invoice with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Invoice> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let mut invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(self.ctx.pool())
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;

        invoice.items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, product_id, name, color, size, unit,
                   unit_price, quantity, discount, note, line_total
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(self.ctx.pool())
        .await?;

        Ok(invoice)
    }
}

async fn insert_invoice_in(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, customer_name, customer_id, subtotal, items_discount,
            overall_discount, total, payment_method, amount_paid, debt_amount,
            created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.customer_name)
    .bind(&invoice.customer_id)
    .bind(invoice.subtotal)
    .bind(invoice.items_discount)
    .bind(invoice.overall_discount)
    .bind(invoice.total)
    .bind(invoice.payment_method)
    .bind(invoice.amount_paid)
    .bind(invoice.debt_amount)
    .bind(&invoice.created_by)
    .bind(invoice.created_at)
    .execute(&mut *conn)
    .await?;

    for item in &invoice.items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, product_id, name, color, size, unit,
                unit_price, quantity, discount, note, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(&item.color)
        .bind(&item.size)
        .bind(&item.unit)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.discount)
        .bind(&item.note)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{admin, clerk, stocked};
    use super::*;
    use crate::Database;
    use petal_core::{CartLine, CoreError, DebtStatus, PaymentMethod};
    use std::time::Duration;

    fn request(lines: Vec<CartLine>, method: PaymentMethod, paid: i64) -> CheckoutRequest {
        CheckoutRequest {
            customer_name: "Chị Lan".into(),
            customer_id: None,
            lines,
            overall_discount: 0,
            payment_method: method,
            amount_paid: paid,
        }
    }

    #[tokio::test]
    async fn test_rose_checkout_decrements_stock() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        let line = CartLine {
            unit_price: Some(10_000),
            ..CartLine::new(&rose.id, 3)
        };
        let invoice = db
            .invoices()
            .checkout(&request(vec![line], PaymentMethod::Cash, 30_000), &clerk())
            .await
            .unwrap();

        assert_eq!(invoice.total, 30_000);
        assert_eq!(invoice.debt_amount, 0);
        let rose = db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(rose.quantity, 2);

        let stored = db.invoices().get_by_id(&invoice.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].name, "Rose");
        assert_eq!(stored.created_by, clerk().id);
        assert!(db.debts().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lily_checkout_rejected_without_writes() {
        let db = Database::in_memory().await.unwrap();
        let lily = stocked(&db, "Lily", 4, 25_000).await;

        let err = db
            .invoices()
            .checkout(
                &request(vec![CartLine::new(&lily.id, 10)], PaymentMethod::Cash, 0),
                &clerk(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rule(CoreError::InsufficientStock { .. })));
        let lily = db.products().get_by_id(&lily.id).await.unwrap().unwrap();
        assert_eq!(lily.quantity, 4);
        assert!(db.invoices().list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_later_line_rolls_back_earlier_lines() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        let lines = vec![CartLine::new(&rose.id, 2), CartLine::new("deleted-product", 1)];
        let err = db
            .invoices()
            .checkout(&request(lines, PaymentMethod::Cash, 0), &clerk())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rule(CoreError::ProductNotFound(_))));
        let rose = db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(rose.quantity, 5);
    }

    #[tokio::test]
    async fn test_underpaid_checkout_creates_customer_debt() {
        let db = Database::in_memory().await.unwrap();
        let tulip = stocked(&db, "Tulip", 20, 15_000).await;

        let invoice = db
            .invoices()
            .checkout(
                &request(vec![CartLine::new(&tulip.id, 4)], PaymentMethod::BankTransfer, 20_000),
                &admin(),
            )
            .await
            .unwrap();
        assert_eq!(invoice.debt_amount, 40_000);

        let debts = db.debts().list(None).await.unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].amount, 40_000);
        assert_eq!(debts[0].counterparty_kind, CounterpartyKind::Customer);
        assert_eq!(debts[0].status, DebtStatus::Unpaid);
        assert_eq!(debts[0].source.as_deref(), Some(invoice.id.as_str()));
    }

    #[tokio::test]
    async fn test_card_underpayment_rejected() {
        let db = Database::in_memory().await.unwrap();
        let tulip = stocked(&db, "Tulip", 20, 15_000).await;

        let err = db
            .invoices()
            .checkout(
                &request(vec![CartLine::new(&tulip.id, 2)], PaymentMethod::Card, 10_000),
                &clerk(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::PartialPaymentNotAllowed { .. })
        ));
        assert_eq!(
            db.products().get_by_id(&tulip.id).await.unwrap().unwrap().quantity,
            20
        );
    }

    #[tokio::test]
    async fn test_blank_customer_name_rejected() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        let mut req = request(vec![CartLine::new(&rose.id, 1)], PaymentMethod::Cash, 10_000);
        req.customer_name = "   ".into();
        assert!(matches!(
            db.invoices().checkout(&req, &clerk()).await,
            Err(DbError::Rule(CoreError::Validation(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 10, 10_000).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let id = rose.id.clone();
            handles.push(tokio::spawn(async move {
                db.invoices()
                    .checkout(&request(vec![CartLine::new(&id, 3)], PaymentMethod::Cash, 30_000), &clerk())
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Rule(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 3);
        let rose = db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(rose.quantity, 1);
        assert_eq!(db.invoices().list(100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_write_timeout_is_retryable_and_rolls_back() {
        let db = Database::new(
            crate::DbConfig::in_memory().write_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        // hold the only connection so the checkout cannot begin
        let held = db.pool().acquire().await.unwrap();
        let err = db
            .invoices()
            .checkout(
                &request(vec![CartLine::new(&rose.id, 1)], PaymentMethod::Cash, 10_000),
                &clerk(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Timeout { operation: "checkout", .. }));
        assert!(err.is_retryable());
        drop(held);

        let rose = db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(rose.quantity, 5);
    }
}
