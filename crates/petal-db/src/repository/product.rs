//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Substring search over name and attributes
//! - CRUD with optimistic version check
//! - Guarded stock moves
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two tills sell the last 3 roses at the same time                      │
//! │                                                                         │
//! │  Till A: UPDATE products SET quantity = quantity - 3                   │
//! │          WHERE id = 'rose' AND quantity >= 3      → 1 row, stock 0     │
//! │                                                                         │
//! │  Till B: UPDATE products SET quantity = quantity - 3                   │
//! │          WHERE id = 'rose' AND quantity >= 3      → 0 rows             │
//! │          └── InsufficientStock { available: 0 }, tx rolled back        │
//! │                                                                         │
//! │  The check and the write are one statement, so no interleaving can    │
//! │  pass both. The CHECK (quantity >= 0) constraint backs it up.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use petal_core::validation::{validate_quantity, validate_search_query};
use petal_core::{AttributeKind, CoreError, Product, ProductInput};

use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, name, color, quality, size, unit, quantity, sell_price, \
     cost_price, max_discount_per_unit, image_url, version, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let roses = db.products().search("rose", 20).await?;
/// let rose = db.products().atomic_decrement(&roses[0].id, 3).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    ctx: RepoContext,
}

impl ProductRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ProductRepository { ctx }
    }

    /// All products, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, color, size");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(products)
    }

    /// Case-insensitive substring search over name, color, quality, size and
    /// unit. An empty query lists everything up to `limit`.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, limit, "Searching products");

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE lower(name) LIKE ?1 ESCAPE '\\'
                OR lower(color) LIKE ?1 ESCAPE '\\'
                OR lower(quality) LIKE ?1 ESCAPE '\\'
                OR lower(size) LIKE ?1 ESCAPE '\\'
                OR lower(unit) LIKE ?1 ESCAPE '\\'
             ORDER BY name, color, size
             LIMIT ?2"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(self.ctx.pool())
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.ctx.pool().acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Inserts a product from already-validated form input.
    pub async fn insert(&self, input: &ProductInput) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            color: input.color.clone(),
            quality: input.quality.clone(),
            size: input.size.clone(),
            unit: input.unit.clone(),
            quantity: input.quantity,
            sell_price: input.sell_price,
            cost_price: input.cost_price,
            max_discount_per_unit: input.max_discount_per_unit,
            image_url: input.image_url.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.ctx
            .write("insert_product", async {
                sqlx::query(
                    r#"
                    INSERT INTO products (
                        id, name, color, quality, size, unit, quantity,
                        sell_price, cost_price, max_discount_per_unit, image_url,
                        version, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                )
                .bind(&product.id)
                .bind(&product.name)
                .bind(&product.color)
                .bind(&product.quality)
                .bind(&product.size)
                .bind(&product.unit)
                .bind(product.quantity)
                .bind(product.sell_price)
                .bind(product.cost_price)
                .bind(product.max_discount_per_unit)
                .bind(&product.image_url)
                .bind(product.version)
                .bind(product.created_at)
                .bind(product.updated_at)
                .execute(self.ctx.pool())
                .await?;

                info!(id = %product.id, name = %product.name, "Product created");
                let event = ChangeEvent::new(Collection::Products, &product.id, ChangeKind::Created);
                Ok((product.clone(), vec![event]))
            })
            .await
    }

    /// Replaces a product's fields if it is still at `expected_version`.
    ///
    /// ## Errors
    /// - `NotFound` if the product is gone
    /// - `VersionConflict` if someone else wrote it since the caller read it
    pub async fn update(
        &self,
        id: &str,
        expected_version: i64,
        input: &ProductInput,
    ) -> DbResult<Product> {
        self.ctx
            .write("update_product", async {
                let mut tx = self.ctx.pool().begin().await?;

                let result = sqlx::query(
                    r#"
                    UPDATE products SET
                        name = ?1, color = ?2, quality = ?3, size = ?4, unit = ?5,
                        quantity = ?6, sell_price = ?7, cost_price = ?8,
                        max_discount_per_unit = ?9, image_url = ?10,
                        version = version + 1, updated_at = ?11
                    WHERE id = ?12 AND version = ?13
                    "#,
                )
                .bind(&input.name)
                .bind(&input.color)
                .bind(&input.quality)
                .bind(&input.size)
                .bind(&input.unit)
                .bind(input.quantity)
                .bind(input.sell_price)
                .bind(input.cost_price)
                .bind(input.max_discount_per_unit)
                .bind(&input.image_url)
                .bind(Utc::now())
                .bind(id)
                .bind(expected_version)
                .execute(&mut *tx)
                .await?;

                let product = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", id))?;

                if result.rows_affected() == 0 {
                    return Err(DbError::conflict("Product", id));
                }

                commit(tx).await?;
                info!(id, version = product.version, "Product updated");
                let event = ChangeEvent::new(Collection::Products, id, ChangeKind::Updated);
                Ok((product, vec![event]))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.ctx
            .write("delete_product", async {
                let result = sqlx::query("DELETE FROM products WHERE id = ?1")
                    .bind(id)
                    .execute(self.ctx.pool())
                    .await?;

                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Product", id));
                }

                info!(id, "Product deleted");
                Ok(((), vec![ChangeEvent::new(Collection::Products, id, ChangeKind::Deleted)]))
            })
            .await
    }

    /// Takes `quantity` units off the shelf, or fails without writing.
    pub async fn atomic_decrement(&self, id: &str, quantity: i64) -> DbResult<Product> {
        validate_quantity(quantity)?;
        self.ctx
            .write("decrement_stock", async {
                let mut tx = self.ctx.pool().begin().await?;
                decrement_in(&mut tx, id, quantity).await?;
                let product = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", id))?;
                commit(tx).await?;

                let event = ChangeEvent::new(Collection::Products, id, ChangeKind::Updated);
                Ok((product, vec![event]))
            })
            .await
    }

    /// Puts `quantity` units back on the shelf.
    pub async fn increment(&self, id: &str, quantity: i64) -> DbResult<Product> {
        validate_quantity(quantity)?;
        self.ctx
            .write("increment_stock", async {
                let mut tx = self.ctx.pool().begin().await?;
                if !increment_in(&mut tx, id, quantity).await? {
                    return Err(DbError::not_found("Product", id));
                }
                let product = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", id))?;
                commit(tx).await?;

                let event = ChangeEvent::new(Collection::Products, id, ChangeKind::Updated);
                Ok((product, vec![event]))
            })
            .await
    }

    /// Number of products whose `kind` attribute equals `value`.
    pub async fn count_using(&self, kind: AttributeKind, value: &str) -> DbResult<i64> {
        let mut conn = self.ctx.pool().acquire().await?;
        count_using_in(&mut conn, kind, value).await
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================
//
// Used by the invoice, order, import and disposal repositories so their stock
// moves commit or roll back together with the records they create.

pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Loads the given products. Missing ids are simply absent from the map.
pub(crate) async fn load_many(
    conn: &mut SqliteConnection,
    ids: impl IntoIterator<Item = &str>,
) -> DbResult<HashMap<String, Product>> {
    let mut products = HashMap::new();
    for id in ids {
        if products.contains_key(id) {
            continue;
        }
        if let Some(product) = fetch_in(conn, id).await? {
            products.insert(product.id.clone(), product);
        }
    }
    Ok(products)
}

/// Guarded decrement. Fails with `InsufficientStock` or `ProductNotFound`
/// when the row does not satisfy `quantity >= n`.
pub(crate) async fn decrement_in(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity - ?1, version = version + 1, updated_at = ?2
        WHERE id = ?3 AND quantity >= ?1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        debug!(id, quantity, "Stock decremented");
        return Ok(());
    }

    let err = match fetch_in(conn, id).await? {
        Some(product) => CoreError::InsufficientStock {
            product: product.label(),
            available: product.quantity,
            requested: quantity,
        },
        None => CoreError::ProductNotFound(id.to_string()),
    };
    Err(err.into())
}

/// Returns false when the product no longer exists.
pub(crate) async fn increment_in(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity + ?1, version = version + 1, updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn count_using_in(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    value: &str,
) -> DbResult<i64> {
    // column name comes from a closed enum, never from input
    let sql = format!(
        "SELECT COUNT(*) FROM products WHERE {} = ?1",
        kind.product_column()
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(value)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
