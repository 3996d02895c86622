//! # petal-db: Database Layer for Petal
//!
//! This crate provides database access for the flower shop back office.
//! It uses SQLite through sqlx; every multi-record mutation runs in a single
//! transaction so stock, sales and debts never disagree.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Petal Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/invoices)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     petal-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ product.rs    │    │  (embedded)  │  │   │
//! │  │   │               │    │ invoice.rs    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ order.rs ...  │    │ 0001_initial │  │   │
//! │  │   │ writer lock   │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ ChangeFeed (broadcast)                              │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │        SSE subscribers                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, repository accessors
//! - [`repository`] - One repository per collection
//! - [`changes`] - Change notifications for live subscribers
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use petal_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("petal.db")).await?;
//!
//! let roses = db.products().search("rose", 20).await?;
//! let invoice = db.invoices().checkout(&request, &actor).await?;
//! ```

pub mod changes;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use changes::{ChangeEvent, ChangeKind, Collection};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::identity::{hash_password, verify_password};
pub use repository::{
    AccessRequestRepository, AttributeOptionRepository, CustomerRepository, DebtRepository,
    DisposalRepository, EmployeeRepository, IdentityRepository, ImportRepository,
    InvoiceRepository, OrderPricing, OrderRepository, ProductRepository,
};
