//! # Repository Module
//!
//! One repository per collection. Handlers never hold a global client; they
//! ask [`Database`](crate::Database) for the repository they need.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │  db.invoices().checkout(&request, &actor)                      │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │       │  ctx.write("checkout", async { tx ... commit })                │
//! │       ▼                                                                 │
//! │  RepoContext::write                                                    │
//! │  ├── timeout(write_timeout)                                            │
//! │  ├── writer lock                                                       │
//! │  ├── run the transaction, ending in repository::commit(tx)             │
//! │  └── on commit: publish ChangeEvents                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product CRUD, search, guarded stock moves
//! - [`InvoiceRepository`] - Atomic in-person checkout
//! - [`OrderRepository`] - Self-service orders and their status machines
//! - [`DebtRepository`] - Debt ledger
//! - [`CustomerRepository`], [`EmployeeRepository`] - Contact records
//! - [`AccessRequestRepository`] - Pending registrations
//! - [`DisposalRepository`] - Inventory write-offs
//! - [`ImportRepository`] - Stock received from suppliers
//! - [`AttributeOptionRepository`] - Attribute vocabularies
//! - [`IdentityRepository`] - Authentication identities

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::changes::{ChangeEvent, ChangeFeed};
use crate::error::{DbError, DbResult};

pub mod access_request;
pub mod customer;
pub mod debt;
pub mod disposal;
pub mod employee;
pub mod identity;
pub mod import;
pub mod invoice;
pub mod option;
pub mod order;
pub mod product;

pub use access_request::AccessRequestRepository;
pub use customer::CustomerRepository;
pub use debt::DebtRepository;
pub use disposal::DisposalRepository;
pub use employee::EmployeeRepository;
pub use identity::IdentityRepository;
pub use import::ImportRepository;
pub use invoice::InvoiceRepository;
pub use option::AttributeOptionRepository;
pub use order::{OrderPricing, OrderRepository};
pub use product::ProductRepository;

tokio::task_local! {
    /// Set by [`commit`] inside the write currently holding the lock.
    static COMMIT_STARTED: Arc<AtomicBool>;
}

/// Commits a write transaction, marking the enclosing [`RepoContext::write`]
/// as past the point where a timeout can still guarantee a rollback.
pub(crate) async fn commit(tx: Transaction<'_, Sqlite>) -> DbResult<()> {
    // outside a write scope there is nothing to mark
    let _ = COMMIT_STARTED.try_with(|started| started.store(true, Ordering::SeqCst));
    tx.commit().await?;
    Ok(())
}

/// Shared handles every repository needs.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pool: SqlitePool,
    feed: ChangeFeed,
    write_timeout: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl RepoContext {
    pub(crate) fn new(
        pool: SqlitePool,
        feed: ChangeFeed,
        write_timeout: Duration,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        RepoContext {
            pool,
            feed,
            write_timeout,
            write_lock,
        }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs a write under the deadline and the writer lock.
    ///
    /// `work` resolves to the value and the change events to publish. Events
    /// go out only after `work` succeeds, which means after its commit. If
    /// the deadline passes before `work` reaches [`commit`], it is dropped
    /// mid-flight, its open transaction rolls back and the caller gets the
    /// retryable [`DbError::Timeout`]. If the deadline passes during the
    /// commit, SQLite may already have applied it: the caller gets
    /// [`DbError::CommitUnconfirmed`] and no events are published.
    ///
    /// Single-statement writes that skip an explicit transaction autocommit
    /// inside `work`; a timeout there is reported as `Timeout`.
    pub(crate) async fn write<T, F>(&self, operation: &'static str, work: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<(T, Vec<ChangeEvent>)>>,
    {
        let commit_started = Arc::new(AtomicBool::new(false));
        let locked = COMMIT_STARTED.scope(commit_started.clone(), async {
            let _guard = self.write_lock.lock().await;
            work.await
        });

        match tokio::time::timeout(self.write_timeout, locked).await {
            Ok(Ok((value, events))) => {
                self.feed.publish(events);
                Ok(value)
            }
            Ok(Err(err)) => {
                if matches!(err, DbError::Rule(_)) {
                    warn!(operation, error = %err, "Write rejected");
                }
                Err(err)
            }
            Err(_) if commit_started.load(Ordering::SeqCst) => {
                error!(
                    operation,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Write timed out during commit, outcome unknown"
                );
                Err(DbError::CommitUnconfirmed { operation })
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Write timed out and was rolled back"
                );
                Err(DbError::Timeout {
                    operation,
                    after: self.write_timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeKind, Collection};
    use crate::{Database, DbConfig};

    async fn short_deadline() -> Database {
        Database::new(DbConfig::in_memory().write_timeout(Duration::from_millis(50)))
            .await
            .unwrap()
    }

    fn invoice_created() -> Vec<ChangeEvent> {
        vec![ChangeEvent::new(Collection::Invoices, "inv-1", ChangeKind::Created)]
    }

    #[tokio::test]
    async fn test_timeout_during_commit_is_unconfirmed() {
        let db = short_deadline().await;
        let mut feed = db.subscribe();

        let err = db
            .ctx()
            .write("checkout", async {
                let tx = db.pool().begin().await?;
                commit(tx).await?;
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(((), invoice_created()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::CommitUnconfirmed { operation: "checkout" }));
        assert!(!err.is_retryable());
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_timeout_before_commit_is_retryable() {
        let db = short_deadline().await;

        let err = db
            .ctx()
            .write("checkout", async {
                let tx = db.pool().begin().await?;
                tokio::time::sleep(Duration::from_millis(200)).await;
                commit(tx).await?;
                Ok(((), invoice_created()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Timeout { operation: "checkout", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_committed_write_publishes() {
        let db = short_deadline().await;
        let mut feed = db.subscribe();

        db.ctx()
            .write("checkout", async {
                let tx = db.pool().begin().await?;
                commit(tx).await?;
                Ok(((), invoice_created()))
            })
            .await
            .unwrap();

        assert_eq!(feed.try_recv().unwrap().id, "inv-1");
    }
}

/// Test fixtures shared by the repository test modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use petal_core::{Actor, Product, ProductInput, Role};

    use crate::Database;

    pub fn admin() -> Actor {
        Actor {
            id: "admin-1".into(),
            name: "Chủ tiệm".into(),
            role: Role::Admin,
            full_access: true,
        }
    }

    pub fn clerk() -> Actor {
        Actor {
            id: "clerk-1".into(),
            name: "Hà".into(),
            role: Role::Employee,
            full_access: false,
        }
    }

    pub fn customer(id: &str) -> Actor {
        Actor {
            id: id.into(),
            name: "Lan".into(),
            role: Role::Customer,
            full_access: false,
        }
    }

    pub fn product_input(name: &str, quantity: i64, sell_price: i64) -> ProductInput {
        ProductInput {
            name: name.into(),
            color: "red".into(),
            quality: "A".into(),
            size: "60cm".into(),
            unit: "stem".into(),
            quantity,
            sell_price,
            cost_price: sell_price / 2,
            max_discount_per_unit: Some(1_000),
            image_url: None,
        }
    }

    pub async fn stocked(db: &Database, name: &str, quantity: i64, sell_price: i64) -> Product {
        db.products()
            .insert(&product_input(name, quantity, sell_price))
            .await
            .unwrap()
    }
}
