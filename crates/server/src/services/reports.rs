//! Read projections for the API surface.
//!
//! These only read the ledger; every computation (value totals, expiry
//! windows) happens here rather than in the store so the shapes stay
//! identical across backends.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use chemstock_core::{LabId, MasterRecordId, PoolId};

use crate::db::{LedgerError, StockLedger};
use crate::models::MasterRecord;
use crate::services::identity;

/// Stock expiring within this many days counts as "expiring soon".
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

/// One chemical's slice of a pool summary.
#[derive(Debug, Clone, Serialize)]
pub struct PoolChemical {
    /// Clean display name.
    pub name: String,
    /// Quantity available in the pool.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Quantity times the looked-up price per unit.
    pub value: Decimal,
}

/// Summary of one pool's holdings.
#[derive(Debug, Clone, Serialize)]
pub struct PoolDistribution {
    /// The pool.
    pub pool_id: PoolId,
    /// Number of distinct lots held.
    pub total_chemicals: usize,
    /// Sum of available quantities.
    pub total_quantity: Decimal,
    /// Sum of chemical values.
    pub total_value: Decimal,
    /// Lots expiring within [`EXPIRY_WINDOW_DAYS`] (or already expired).
    pub expiring_count: usize,
    /// The lots themselves.
    pub chemicals: Vec<PoolChemical>,
}

/// Central stock reduced to what the allocation form needs.
#[derive(Debug, Clone, Serialize)]
pub struct SimplifiedStock {
    /// Master record behind the row.
    pub master_id: MasterRecordId,
    /// Clean display name.
    pub chemical_name: String,
    /// Quantity available centrally.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Price per unit from the master record, if known.
    pub price_per_unit: Option<Decimal>,
}

/// Read-projection service.
pub struct ReportService {
    ledger: Arc<dyn StockLedger>,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self { ledger }
    }

    /// Per-pool distribution summary. Every pool appears, holdings or not.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` when the store fails.
    pub async fn distribution(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<PoolDistribution>, LedgerError> {
        let masters = self.ledger.list_masters().await?;
        let live = self.ledger.all_live_stock().await?;

        // Price lookup by display name; list_masters is newest-first, so the
        // most recent lot wins when display names collide.
        let mut prices: HashMap<String, Decimal> = HashMap::new();
        for master in &masters {
            prices
                .entry(identity::base_name(&master.chemical_name).to_string())
                .or_insert(master.price_per_unit);
        }

        let summaries = PoolId::all()
            .into_iter()
            .map(|pool| {
                let chemicals: Vec<PoolChemical> = live
                    .iter()
                    .filter(|row| row.pool_id == pool)
                    .map(|row| {
                        let price = prices.get(&row.display_name).copied().unwrap_or_default();
                        PoolChemical {
                            name: row.display_name.clone(),
                            quantity: row.quantity,
                            unit: row.unit.clone(),
                            expiry_date: row.expiry_date,
                            value: row.quantity * price,
                        }
                    })
                    .collect();

                let expiring_count = chemicals
                    .iter()
                    .filter(|chem| {
                        (chem.expiry_date - today).num_days() <= EXPIRY_WINDOW_DAYS
                    })
                    .count();

                PoolDistribution {
                    pool_id: pool,
                    total_chemicals: chemicals.len(),
                    total_quantity: chemicals.iter().map(|c| c.quantity).sum(),
                    total_value: chemicals.iter().map(|c| c.value).sum(),
                    expiring_count,
                    chemicals,
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Central stock in the shape the allocation form consumes.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` when the store fails.
    pub async fn central_simplified(&self) -> Result<Vec<SimplifiedStock>, LedgerError> {
        let masters = self.ledger.list_masters().await?;
        let prices: HashMap<MasterRecordId, Decimal> = masters
            .iter()
            .map(|m| (m.id, m.price_per_unit))
            .collect();

        let live = self.ledger.live_stock_for_pool(PoolId::Central).await?;
        Ok(live
            .into_iter()
            .map(|row| SimplifiedStock {
                master_id: row.master_id,
                chemical_name: row.display_name,
                quantity: row.quantity,
                unit: row.unit,
                expiry_date: row.expiry_date,
                price_per_unit: prices.get(&row.master_id).copied(),
            })
            .collect())
    }

    /// Master records referenced by a lab's live stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` when the store fails.
    pub async fn lab_masters(&self, lab: LabId) -> Result<Vec<MasterRecord>, LedgerError> {
        let live = self.ledger.live_stock_for_pool(PoolId::Lab(lab)).await?;
        let masters = self.ledger.list_masters().await?;
        let by_id: HashMap<MasterRecordId, &MasterRecord> =
            masters.iter().map(|m| (m.id, m)).collect();

        Ok(live
            .iter()
            .filter_map(|row| by_id.get(&row.master_id).map(|m| (*m).clone()))
            .collect())
    }
}
