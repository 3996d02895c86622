//! # Debt Repository
//!
//! The debt ledger: what the shop owes suppliers and what customers owe the
//! shop. A debt is created once and afterwards only its paid flag changes.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use petal_core::validation::{validate_amount, validate_name};
use petal_core::{Debt, DebtStatus, NewDebt, ValidationError};

use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

const DEBT_COLUMNS: &str = "id, counterparty_kind, counterparty_name, counterparty_id, amount, \
     status, source, note, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct DebtRepository {
    ctx: RepoContext,
}

impl DebtRepository {
    pub fn new(ctx: RepoContext) -> Self {
        DebtRepository { ctx }
    }

    /// Records a debt entered by hand.
    pub async fn create(&self, debt: &NewDebt) -> DbResult<Debt> {
        self.ctx
            .write("create_debt", async {
                let mut conn = self.ctx.pool().acquire().await?;
                let debt = insert_debt_in(&mut conn, debt).await?;
                let event = ChangeEvent::new(Collection::Debts, &debt.id, ChangeKind::Created);
                Ok((debt, vec![event]))
            })
            .await
    }

    /// Newest first, optionally only one status.
    pub async fn list(&self, status: Option<DebtStatus>) -> DbResult<Vec<Debt>> {
        let debts = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {DEBT_COLUMNS} FROM debts WHERE status = ?1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Debt>(&sql)
                    .bind(status)
                    .fetch_all(self.ctx.pool())
                    .await?
            }
            None => {
                let sql = format!("SELECT {DEBT_COLUMNS} FROM debts ORDER BY created_at DESC");
                sqlx::query_as::<_, Debt>(&sql)
                    .fetch_all(self.ctx.pool())
                    .await?
            }
        };
        Ok(debts)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Debt>> {
        let mut conn = self.ctx.pool().acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Flips paid ↔ unpaid.
    pub async fn toggle_status(&self, id: &str) -> DbResult<Debt> {
        self.ctx
            .write("toggle_debt", async {
                let mut tx = self.ctx.pool().begin().await?;
                let current = fetch_in(&mut tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Debt", id))?;

                let next = current.status.toggled();
                let now = Utc::now();
                sqlx::query("UPDATE debts SET status = ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(next)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                commit(tx).await?;

                info!(id, status = ?next, "Debt status toggled");
                let debt = Debt {
                    status: next,
                    updated_at: now,
                    ..current
                };
                Ok((debt, vec![ChangeEvent::new(Collection::Debts, id, ChangeKind::Updated)]))
            })
            .await
    }
}

async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Debt>> {
    let sql = format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = ?1");
    let debt = sqlx::query_as::<_, Debt>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(debt)
}

/// Inserts a new unpaid debt on the given connection or transaction.
pub(crate) async fn insert_debt_in(conn: &mut SqliteConnection, new: &NewDebt) -> DbResult<Debt> {
    let counterparty_name = validate_name("counterparty", &new.counterparty_name)?;
    validate_amount("amount", new.amount)?;
    if new.amount == 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    let now = Utc::now();
    let debt = Debt {
        id: Uuid::new_v4().to_string(),
        counterparty_kind: new.counterparty_kind,
        counterparty_name,
        counterparty_id: new.counterparty_id.clone(),
        amount: new.amount,
        status: DebtStatus::Unpaid,
        source: new.source.clone(),
        note: new.note.clone(),
        created_at: new.created_at.unwrap_or(now),
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO debts (
            id, counterparty_kind, counterparty_name, counterparty_id, amount,
            status, source, note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&debt.id)
    .bind(debt.counterparty_kind)
    .bind(&debt.counterparty_name)
    .bind(&debt.counterparty_id)
    .bind(debt.amount)
    .bind(debt.status)
    .bind(&debt.source)
    .bind(&debt.note)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .execute(&mut *conn)
    .await?;

    info!(id = %debt.id, kind = ?debt.counterparty_kind, amount = debt.amount, "Debt recorded");
    Ok(debt)
}
