//! # Petal Server
//!
//! JSON-over-HTTP API for the flower shop back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Petal Server                                    │
//! │                                                                         │
//! │  Admin / Storefront ──► /api/* (axum) ──► AuthActor ──► policy          │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                                   petal-db repos        │
//! │                                                         │               │
//! │  Live views ◄──────────── /api/events (SSE) ◄── change feed             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers authenticate, authorize through `petal_core::policy`, then make a
//! single repository call. Every multi-record write is atomic in petal-db.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;
pub use state::AppState;
