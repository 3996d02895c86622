//! # Taxonomy
//!
//! Product attributes (name, color, quality, size, unit) are picked from small
//! vocabularies that admins maintain. Deleting an option never rewrites the
//! products that use it; the deletion policy only decides whether the delete
//! is allowed while the value is still referenced.
//!
//! ```text
//!   Orphan (default)                Block
//!   ────────────────                ─────
//!   delete "lavender"               delete "lavender"
//!     │                               │
//!     ▼                               ▼
//!   option gone, 3 products       OptionInUse { count: 3 }
//!   still say "lavender"          nothing changes
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::validate_required;

/// Which product attribute a vocabulary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AttributeKind {
    Name,
    Color,
    Quality,
    Size,
    Unit,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 5] = [
        AttributeKind::Name,
        AttributeKind::Color,
        AttributeKind::Quality,
        AttributeKind::Size,
        AttributeKind::Unit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Name => "name",
            AttributeKind::Color => "color",
            AttributeKind::Quality => "quality",
            AttributeKind::Size => "size",
            AttributeKind::Unit => "unit",
        }
    }

    /// Products column holding this attribute.
    pub fn product_column(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: AttributeKind::ALL
                    .iter()
                    .map(|k| k.as_str().to_string())
                    .collect(),
            })
    }
}

/// One entry of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AttributeOption {
    pub kind: AttributeKind,
    pub value: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What happens when an option still used by products is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionDeletionPolicy {
    /// Delete anyway; products keep the old value.
    #[default]
    Orphan,
    /// Refuse while any product references the value.
    Block,
}

/// Decides whether an option referenced by `in_use` products may be deleted.
pub fn check_option_deletion(
    policy: OptionDeletionPolicy,
    kind: AttributeKind,
    value: &str,
    in_use: i64,
) -> CoreResult<()> {
    match policy {
        OptionDeletionPolicy::Orphan => Ok(()),
        OptionDeletionPolicy::Block if in_use == 0 => Ok(()),
        OptionDeletionPolicy::Block => Err(CoreError::OptionInUse {
            kind: kind.to_string(),
            value: value.to_string(),
            count: in_use,
        }),
    }
}

/// Trims an option value and checks it is usable.
pub fn normalize_option_value(value: &str) -> CoreResult<String> {
    Ok(validate_required("value", value, 100)?)
}
