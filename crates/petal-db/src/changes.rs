//! # Change Feed
//!
//! Every committed write publishes one [`ChangeEvent`] per touched record.
//! Subscribers (the server's SSE endpoint, tests) receive them in commit
//! order and re-read whatever they display.
//!
//! ```text
//!   checkout tx commits
//!        │
//!        ├──► { collection: invoices, id: inv-1, kind: created }
//!        ├──► { collection: products, id: rose,  kind: updated }
//!        └──► { collection: debts,    id: d-7,   kind: created }
//!                         │
//!                         ▼
//!              broadcast::Sender (bounded)
//!                 │            │
//!                 ▼            ▼
//!            SSE client    SSE client
//! ```
//!
//! The channel is bounded. A subscriber that falls behind loses the oldest
//! events and sees `RecvError::Lagged`; it should reload its view.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the broadcast buffer.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Invoices,
    Orders,
    Debts,
    AccessRequests,
    Employees,
    Customers,
    Disposals,
    Imports,
    AttributeOptions,
    Identities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(collection: Collection, id: impl Into<String>, kind: ChangeKind) -> Self {
        ChangeEvent {
            collection,
            id: id.into(),
            kind,
        }
    }
}

/// Sending half of the feed, shared by every repository.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChangeFeed { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes events after a commit. Having no subscribers is normal.
    pub fn publish(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            trace!(?event, "Publishing change");
            let _ = self.sender.send(event);
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(CHANGE_FEED_CAPACITY)
    }
}
