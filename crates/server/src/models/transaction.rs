//! Audit transaction domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chemstock_core::{ActorId, LiveStockId, PoolId, TransactionId};

/// What kind of stock movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stock received into the central repository.
    Entry,
    /// Stock moved from the central repository to a lab.
    Allocation,
}

impl TransactionKind {
    /// The wire/storage form of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Allocation => "allocation",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Self::Entry),
            "allocation" => Ok(Self::Allocation),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// One immutable audit entry. Append-only; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    /// Unique transaction ID.
    pub id: TransactionId,
    /// Chemical name at the time of the movement (may be suffixed).
    pub chemical_name: String,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Live stock row affected by the movement.
    pub live_stock_id: LiveStockId,
    /// Pool the quantity came from.
    pub source_pool: PoolId,
    /// Pool the quantity went to.
    pub destination_pool: PoolId,
    /// Quantity moved.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Verified identity of the user who performed the operation.
    pub actor_id: ActorId,
    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Input for recording a new audit transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Chemical name at the time of the movement.
    pub chemical_name: String,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Live stock row affected.
    pub live_stock_id: LiveStockId,
    /// Pool the quantity came from.
    pub source_pool: PoolId,
    /// Pool the quantity went to.
    pub destination_pool: PoolId,
    /// Quantity moved.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Verified identity of the user performing the operation.
    pub actor_id: ActorId,
}
