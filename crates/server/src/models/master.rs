//! Master record domain models - canonical records of chemical batch intakes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chemstock_core::MasterRecordId;

/// A master record - one lot of a chemical received into the central
/// repository, identified by name, vendor, unit and expiry date.
///
/// `quantity` is the cumulative total ever received for this lot; the
/// currently available amount per pool lives in the live-stock projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Unique record ID.
    pub id: MasterRecordId,
    /// Chemical name, possibly carrying a disambiguation suffix
    /// (e.g. "Acetone - A").
    pub chemical_name: String,
    /// Cumulative quantity received across all intakes of this lot.
    pub quantity: Decimal,
    /// Unit of measure (e.g. "L", "kg").
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Intake batch identifier (`BATCH-YYYYMMDD-###`).
    pub batch_id: String,
    /// Supplying vendor.
    pub vendor: String,
    /// Price per unit at intake time.
    pub price_per_unit: Decimal,
    /// Receiving department.
    pub department: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new master record.
#[derive(Debug, Clone)]
pub struct NewMasterRecord {
    /// Chemical name, already disambiguated by the resolver if needed.
    pub chemical_name: String,
    /// Quantity received.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Intake batch identifier.
    pub batch_id: String,
    /// Supplying vendor.
    pub vendor: String,
    /// Price per unit.
    pub price_per_unit: Decimal,
    /// Receiving department.
    pub department: String,
}

/// Partial update of a master record.
///
/// Master records change in exactly two ways: a rename during expiry
/// disambiguation, or a quantity increment on an exact-match merge.
#[derive(Debug, Clone, Default)]
pub struct MasterUpdate {
    /// New chemical name (disambiguation rename).
    pub rename: Option<String>,
    /// Quantity to add to the cumulative total.
    pub add_quantity: Option<Decimal>,
}
