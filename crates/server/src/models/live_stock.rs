//! Live stock domain models - per-pool projections of available quantity.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chemstock_core::{LiveStockId, MasterRecordId, PoolId};

/// Currently available quantity of one master lot in one pool.
///
/// Exactly one row exists per `(master_id, pool_id)` pair. The central row is
/// created together with its master record; lab rows appear lazily on first
/// allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStock {
    /// Unique row ID.
    pub id: LiveStockId,
    /// Master record this row projects.
    pub master_id: MasterRecordId,
    /// Chemical name, kept in lockstep with the master (may be suffixed).
    pub chemical_name: String,
    /// Clean, suffix-free name shown to the pool's users.
    pub display_name: String,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Quantity currently available in this pool.
    pub quantity: Decimal,
    /// Cumulative quantity ever received by this pool.
    pub original_quantity: Decimal,
    /// Pool this row belongs to.
    pub pool_id: PoolId,
    /// True once a lab pool has received any quantity of this lot.
    pub is_allocated: bool,
}

/// Input for creating a new live stock row.
#[derive(Debug, Clone)]
pub struct NewLiveStock {
    /// Master record this row projects.
    pub master_id: MasterRecordId,
    /// Chemical name (may be suffixed).
    pub chemical_name: String,
    /// Clean, suffix-free display name.
    pub display_name: String,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Quantity available.
    pub quantity: Decimal,
    /// Cumulative quantity received.
    pub original_quantity: Decimal,
    /// Pool the row belongs to.
    pub pool_id: PoolId,
    /// Whether this row was created by an allocation.
    pub is_allocated: bool,
}
