//! # Import Repository
//!
//! Stock received from suppliers. Recording an import adds each line's
//! quantity to the product, writes the receipt, and opens a supplier debt
//! for whatever was not paid on delivery, all in one transaction.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::{validate_amount, validate_cart_size, validate_name, validate_quantity};
use petal_core::{
    Actor, CounterpartyKind, ImportItem, ImportReceipt, ImportRequest, Money, NewDebt, ValidationError,
};

use super::debt::insert_debt_in;
use super::product::{fetch_in, increment_in};
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const IMPORT_COLUMNS: &str =
    "id, supplier_name, total_cost, amount_paid, debt_amount, created_by, created_at";

#[derive(Debug, Clone)]
pub struct ImportRepository {
    ctx: RepoContext,
}

impl ImportRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ImportRepository { ctx }
    }

    pub async fn record(&self, request: &ImportRequest, actor: &Actor) -> DbResult<ImportReceipt> {
        let supplier_name = validate_name("supplier name", &request.supplier_name)?;
        validate_cart_size(request.lines.len())?;
        for line in &request.lines {
            validate_quantity(line.quantity)?;
            validate_amount("unit cost", line.unit_cost)?;
        }
        validate_amount("amount paid", request.amount_paid)?;

        self.ctx
            .write("record_import", async {
                let mut tx = self.ctx.pool().begin().await?;
                let import_id = Uuid::new_v4().to_string();

                let mut items = Vec::with_capacity(request.lines.len());
                let mut events = Vec::with_capacity(request.lines.len() + 2);
                for line in &request.lines {
                    let product = fetch_in(&mut tx, &line.product_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Product", line.product_id.as_str()))?;
                    increment_in(&mut tx, &product.id, line.quantity).await?;
                    events.push(ChangeEvent::new(Collection::Products, &product.id, ChangeKind::Updated));

                    items.push(ImportItem {
                        id: Uuid::new_v4().to_string(),
                        import_id: import_id.clone(),
                        product_id: product.id.clone(),
                        product_name: product.label(),
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                    });
                }

                let total_cost = items
                    .iter()
                    .try_fold(Money::zero(), |acc, i| {
                        Money::from_amount(i.unit_cost)
                            .checked_multiply_quantity(i.quantity)
                            .and_then(|line| acc.checked_add(line))
                    })
                    .ok_or_else(|| ValidationError::Overflow {
                        field: "total cost".to_string(),
                    })?;
                let debt = total_cost.saturating_sub_floor_zero(Money::from_amount(request.amount_paid));

                let receipt = ImportReceipt {
                    id: import_id,
                    supplier_name: supplier_name.clone(),
                    total_cost: total_cost.amount(),
                    amount_paid: request.amount_paid,
                    debt_amount: debt.amount(),
                    created_by: actor.id.clone(),
                    created_at: Utc::now(),
                    items,
                };

                sqlx::query(
                    r#"
                    INSERT INTO imports (
                        id, supplier_name, total_cost, amount_paid, debt_amount,
                        created_by, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&receipt.id)
                .bind(&receipt.supplier_name)
                .bind(receipt.total_cost)
                .bind(receipt.amount_paid)
                .bind(receipt.debt_amount)
                .bind(&receipt.created_by)
                .bind(receipt.created_at)
                .execute(&mut *tx)
                .await?;

                for item in &receipt.items {
                    sqlx::query(
                        r#"
                        INSERT INTO import_items (id, import_id, product_id, product_name, quantity, unit_cost)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        "#,
                    )
                    .bind(&item.id)
                    .bind(&item.import_id)
                    .bind(&item.product_id)
                    .bind(&item.product_name)
                    .bind(item.quantity)
                    .bind(item.unit_cost)
                    .execute(&mut *tx)
                    .await?;
                }

                if receipt.debt_amount > 0 {
                    let debt = insert_debt_in(
                        &mut tx,
                        &NewDebt {
                            counterparty_kind: CounterpartyKind::Supplier,
                            counterparty_name: receipt.supplier_name.clone(),
                            counterparty_id: None,
                            amount: receipt.debt_amount,
                            source: Some(receipt.id.clone()),
                            note: None,
                            created_at: Some(receipt.created_at),
                        },
                    )
                    .await?;
                    events.push(ChangeEvent::new(Collection::Debts, &debt.id, ChangeKind::Created));
                }

                commit(tx).await?;

                info!(
                    id = %receipt.id,
                    supplier = %receipt.supplier_name,
                    total = %total_cost,
                    debt = %debt,
                    "Import recorded"
                );
                events.push(ChangeEvent::new(Collection::Imports, &receipt.id, ChangeKind::Created));
                Ok((receipt, events))
            })
            .await
    }

    /// Newest first, without line items.
    pub async fn list(&self) -> DbResult<Vec<ImportReceipt>> {
        let sql = format!("SELECT {IMPORT_COLUMNS} FROM imports ORDER BY created_at DESC");
        let receipts = sqlx::query_as::<_, ImportReceipt>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(receipts)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<ImportReceipt> {
        let sql = format!("SELECT {IMPORT_COLUMNS} FROM imports WHERE id = ?1");
        let mut receipt = sqlx::query_as::<_, ImportReceipt>(&sql)
            .bind(id)
            .fetch_optional(self.ctx.pool())
            .await?
            .ok_or_else(|| DbError::not_found("Import", id))?;

        receipt.items = sqlx::query_as::<_, ImportItem>(
            "SELECT id, import_id, product_id, product_name, quantity, unit_cost \
             FROM import_items WHERE import_id = ?1 ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(self.ctx.pool())
        .await?;

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{admin, stocked};
    use super::*;
    use crate::Database;
    use petal_core::ImportLine;

    fn request(product_id: &str, quantity: i64, unit_cost: i64, paid: i64) -> ImportRequest {
        ImportRequest {
            supplier_name: "Đà Lạt Flowers".into(),
            lines: vec![ImportLine {
                product_id: product_id.into(),
                quantity,
                unit_cost,
            }],
            amount_paid: paid,
        }
    }

    #[tokio::test]
    async fn test_import_restocks_and_opens_debt() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        let receipt = db
            .imports()
            .record(&request(&rose.id, 100, 4_000, 300_000), &admin())
            .await
            .unwrap();
        assert_eq!(receipt.total_cost, 400_000);
        assert_eq!(receipt.debt_amount, 100_000);

        assert_eq!(db.products().get_by_id(&rose.id).await.unwrap().unwrap().quantity, 105);

        let debts = db.debts().list(None).await.unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].counterparty_kind, CounterpartyKind::Supplier);
        assert_eq!(debts[0].amount, 100_000);
        assert_eq!(debts[0].source.as_deref(), Some(receipt.id.as_str()));

        let stored = db.imports().get_by_id(&receipt.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_paid_in_full_has_no_debt() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 0, 10_000).await;
        let receipt = db
            .imports()
            .record(&request(&rose.id, 10, 4_000, 50_000), &admin())
            .await
            .unwrap();
        assert_eq!(receipt.debt_amount, 0);
        assert!(db.debts().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_receipt_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let req = ImportRequest {
            supplier_name: "Đà Lạt Flowers".into(),
            lines: vec![],
            amount_paid: 50_000,
        };

        assert!(matches!(
            db.imports().record(&req, &admin()).await,
            Err(DbError::Rule(_))
        ));
        assert!(db.imports().list().await.unwrap().is_empty());
        assert!(db.debts().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_unit_cost_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;

        assert!(matches!(
            db.imports()
                .record(&request(&rose.id, 3, i64::MAX / 2, 0), &admin())
                .await,
            Err(DbError::Rule(_))
        ));
        assert_eq!(db.products().get_by_id(&rose.id).await.unwrap().unwrap().quantity, 5);
        assert!(db.imports().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let db = Database::in_memory().await.unwrap();
        let rose = stocked(&db, "Rose", 5, 10_000).await;
        let mut req = request(&rose.id, 10, 4_000, 0);
        req.lines.push(ImportLine {
            product_id: "missing".into(),
            quantity: 1,
            unit_cost: 1_000,
        });

        assert!(matches!(
            db.imports().record(&req, &admin()).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(db.products().get_by_id(&rose.id).await.unwrap().unwrap().quantity, 5);
        assert!(db.imports().list().await.unwrap().is_empty());
        assert!(db.debts().list(None).await.unwrap().is_empty());
    }
}
