//! # Attribute Option Repository
//!
//! The vocabularies product forms pick from. Options are keyed by
//! `(kind, value)`; deleting one never rewrites products.

use chrono::Utc;
use tracing::info;

use petal_core::taxonomy::{check_option_deletion, normalize_option_value};
use petal_core::{AttributeKind, AttributeOption, OptionDeletionPolicy};

use super::product::count_using_in;
use super::{commit, RepoContext};
use crate::changes::{ChangeEvent, ChangeKind, Collection};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct AttributeOptionRepository {
    ctx: RepoContext,
}

impl AttributeOptionRepository {
    pub fn new(ctx: RepoContext) -> Self {
        AttributeOptionRepository { ctx }
    }

    /// Options of one kind, alphabetical.
    pub async fn list(&self, kind: AttributeKind) -> DbResult<Vec<AttributeOption>> {
        let options = sqlx::query_as::<_, AttributeOption>(
            "SELECT kind, value, created_at FROM attribute_options WHERE kind = ?1 ORDER BY value",
        )
        .bind(kind)
        .fetch_all(self.ctx.pool())
        .await?;
        Ok(options)
    }

    pub async fn add(&self, kind: AttributeKind, value: &str) -> DbResult<AttributeOption> {
        let value = normalize_option_value(value)?;
        self.ctx
            .write("add_option", async {
                let option = AttributeOption {
                    kind,
                    value: value.clone(),
                    created_at: Utc::now(),
                };

                sqlx::query("INSERT INTO attribute_options (kind, value, created_at) VALUES (?1, ?2, ?3)")
                    .bind(option.kind)
                    .bind(&option.value)
                    .bind(option.created_at)
                    .execute(self.ctx.pool())
                    .await
                    .map_err(|e| match DbError::from(e) {
                        DbError::UniqueViolation { .. } => {
                            DbError::duplicate(kind.as_str(), value.as_str())
                        }
                        other => other,
                    })?;

                info!(%kind, value = %option.value, "Option added");
                let event = ChangeEvent::new(
                    Collection::AttributeOptions,
                    &option_key(kind, &option.value),
                    ChangeKind::Created,
                );
                Ok((option, vec![event]))
            })
            .await
    }

    /// Deletes an option. Under [`OptionDeletionPolicy::Block`] a value still
    /// used by any product is refused.
    pub async fn delete(
        &self,
        kind: AttributeKind,
        value: &str,
        policy: OptionDeletionPolicy,
    ) -> DbResult<()> {
        self.ctx
            .write("delete_option", async {
                let mut tx = self.ctx.pool().begin().await?;

                let in_use = count_using_in(&mut tx, kind, value).await?;
                check_option_deletion(policy, kind, value, in_use)?;

                let result = sqlx::query("DELETE FROM attribute_options WHERE kind = ?1 AND value = ?2")
                    .bind(kind)
                    .bind(value)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("AttributeOption", option_key(kind, value)));
                }
                commit(tx).await?;

                info!(%kind, value, orphaned = in_use, "Option deleted");
                let event = ChangeEvent::new(
                    Collection::AttributeOptions,
                    &option_key(kind, value),
                    ChangeKind::Deleted,
                );
                Ok(((), vec![event]))
            })
            .await
    }

    /// Number of products whose attribute currently holds `value`.
    pub async fn usage_count(&self, kind: AttributeKind, value: &str) -> DbResult<i64> {
        let mut conn = self.ctx.pool().acquire().await?;
        count_using_in(&mut conn, kind, value).await
    }
}

fn option_key(kind: AttributeKind, value: &str) -> String {
    format!("{}/{}", kind, value)
}
