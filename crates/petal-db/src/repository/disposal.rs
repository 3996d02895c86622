//! # Disposal Repository
//!
//! Write-offs of wilted or damaged stock. Each entry takes the quantity off
//! the shelf with the same guard checkout uses, in the same transaction that
//! writes the log entry.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::{validate_quantity, validate_required};
use petal_core::{Actor, DisposalLogEntry, DisposalRequest};

use super::product::{decrement_in, fetch_in};
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const DISPOSAL_COLUMNS: &str =
    "id, product_id, product_name, quantity, reason, actor_id, actor_name, created_at";

#[derive(Debug, Clone)]
pub struct DisposalRepository {
    ctx: RepoContext,
}

impl DisposalRepository {
    pub fn new(ctx: RepoContext) -> Self {
        DisposalRepository { ctx }
    }

    pub async fn record(&self, request: &DisposalRequest, actor: &Actor) -> DbResult<DisposalLogEntry> {
        validate_quantity(request.quantity)?;
        let reason = validate_required("reason", &request.reason, 500)?;

        self.ctx
            .write("record_disposal", async {
                let mut tx = self.ctx.pool().begin().await?;

                let product = fetch_in(&mut tx, &request.product_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", request.product_id.as_str()))?;
                decrement_in(&mut tx, &product.id, request.quantity).await?;

                let entry = DisposalLogEntry {
                    id: Uuid::new_v4().to_string(),
                    product_id: product.id.clone(),
                    product_name: product.label(),
                    quantity: request.quantity,
                    reason: reason.clone(),
                    actor_id: actor.id.clone(),
                    actor_name: actor.name.clone(),
                    created_at: Utc::now(),
                };

                sqlx::query(
                    r#"
                    INSERT INTO disposals (
                        id, product_id, product_name, quantity, reason,
                        actor_id, actor_name, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .bind(&entry.id)
                .bind(&entry.product_id)
                .bind(&entry.product_name)
                .bind(entry.quantity)
                .bind(&entry.reason)
                .bind(&entry.actor_id)
                .bind(&entry.actor_name)
                .bind(entry.created_at)
                .execute(&mut *tx)
                .await?;

                commit(tx).await?;

                info!(
                    product = %entry.product_name,
                    quantity = entry.quantity,
                    actor = %entry.actor_id,
                    "Stock disposed"
                );
                let events = vec![
                    ChangeEvent::new(Collection::Disposals, &entry.id, ChangeKind::Created),
                    ChangeEvent::new(Collection::Products, &entry.product_id, ChangeKind::Updated),
                ];
                Ok((entry, events))
            })
            .await
    }

    /// Newest first.
    pub async fn list(&self) -> DbResult<Vec<DisposalLogEntry>> {
        let sql = format!("SELECT {DISPOSAL_COLUMNS} FROM disposals ORDER BY created_at DESC");
        let entries = sqlx::query_as::<_, DisposalLogEntry>(&sql)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(entries)
    }

    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<DisposalLogEntry>> {
        let sql = format!(
            "SELECT {DISPOSAL_COLUMNS} FROM disposals WHERE product_id = ?1 ORDER BY created_at DESC"
        );
        let entries = sqlx::query_as::<_, DisposalLogEntry>(&sql)
            .bind(product_id)
            .fetch_all(self.ctx.pool())
            .await?;
        Ok(entries)
    }
}
