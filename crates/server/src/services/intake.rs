//! Batch intake: reconcile incoming chemical entries into the central pool.
//!
//! Entries are processed independently - each one gets its own ledger
//! session, so a storage failure on entry N leaves entries 1..N committed.
//! That asymmetry with allocation (which is all-or-nothing) is deliberate:
//! received stock that made it onto the shelf stays recorded.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chemstock_core::{ActorId, PoolId};

use crate::db::{LedgerError, LedgerSession, StockLedger};
use crate::models::{
    MasterRecord, MasterUpdate, NewLiveStock, NewMasterRecord, NewTransaction, TransactionKind,
};
use crate::services::identity::{self, Resolution};

/// One incoming chemical entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeEntry {
    /// Submitted chemical name (no suffix expected; the resolver adds one
    /// if needed).
    pub chemical_name: String,
    /// Quantity received.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Expiry date of the lot.
    pub expiry_date: NaiveDate,
    /// Supplying vendor.
    pub vendor: String,
    /// Price per unit.
    pub price_per_unit: Decimal,
    /// Receiving department.
    pub department: String,
}

/// An intake call: a list of entries under one batch identifier.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    /// Entries to reconcile, in order.
    pub entries: Vec<IntakeEntry>,
    /// Reuse the most recent batch id instead of generating a fresh one.
    pub use_previous_batch_id: bool,
}

/// Result of an intake call.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    /// Batch id the entries were recorded under.
    pub batch_id: String,
    /// Master records created or merged into, in entry order.
    pub records: Vec<MasterRecord>,
}

/// Batch intake engine.
pub struct IntakeService {
    ledger: Arc<dyn StockLedger>,
}

impl IntakeService {
    /// Create a new intake service.
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self { ledger }
    }

    /// Reconcile a batch of entries into the central pool.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` when the store fails; entries committed before
    /// the failure stay committed.
    #[instrument(skip(self, request), fields(entries = request.entries.len(), actor = %actor))]
    pub async fn intake(
        &self,
        actor: ActorId,
        request: IntakeRequest,
    ) -> Result<IntakeOutcome, LedgerError> {
        let batch_id = if request.use_previous_batch_id {
            match self.ledger.latest_batch_id().await? {
                Some(id) => id,
                None => generate_batch_id(),
            }
        } else {
            generate_batch_id()
        };

        let mut records = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let mut session = self.ledger.begin().await?;
            match apply_entry(session.as_mut(), actor, &batch_id, entry).await {
                Ok(record) => {
                    session.commit().await?;
                    records.push(record);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        committed = records.len(),
                        chemical = %entry.chemical_name,
                        "Intake entry failed; earlier entries stay committed"
                    );
                    session.rollback().await?;
                    return Err(e);
                }
            }
        }

        tracing::info!(batch_id = %batch_id, records = records.len(), "Intake batch recorded");
        Ok(IntakeOutcome { batch_id, records })
    }
}

/// Reconcile one entry inside an open session.
async fn apply_entry(
    session: &mut dyn LedgerSession,
    actor: ActorId,
    batch_id: &str,
    entry: &IntakeEntry,
) -> Result<MasterRecord, LedgerError> {
    let existing = session
        .find_matching_masters(&entry.chemical_name, &entry.vendor, &entry.unit)
        .await?;
    let candidate = identity::Candidate {
        name: &entry.chemical_name,
        expiry_date: entry.expiry_date,
    };

    match identity::resolve(&candidate, &existing) {
        Resolution::NoMatch => {
            create_lot(session, actor, batch_id, entry, entry.chemical_name.clone()).await
        }
        Resolution::NewerLot { name } => create_lot(session, actor, batch_id, entry, name).await,
        Resolution::ExactMatch(record) => merge_into(session, actor, entry, record).await,
        Resolution::EarlierLot { renames } => {
            for (id, new_name) in renames {
                session
                    .update_master(
                        id,
                        MasterUpdate {
                            rename: Some(new_name.clone()),
                            add_quantity: None,
                        },
                    )
                    .await?;
                session
                    .rename_live_stock(id, PoolId::Central, &new_name)
                    .await?;
            }
            create_lot(session, actor, batch_id, entry, entry.chemical_name.clone()).await
        }
    }
}

/// Create a fresh lot: master record, central live stock, audit entry.
async fn create_lot(
    session: &mut dyn LedgerSession,
    actor: ActorId,
    batch_id: &str,
    entry: &IntakeEntry,
    chemical_name: String,
) -> Result<MasterRecord, LedgerError> {
    let master = session
        .create_master(NewMasterRecord {
            chemical_name: chemical_name.clone(),
            quantity: entry.quantity,
            unit: entry.unit.clone(),
            expiry_date: entry.expiry_date,
            batch_id: batch_id.to_string(),
            vendor: entry.vendor.clone(),
            price_per_unit: entry.price_per_unit,
            department: entry.department.clone(),
        })
        .await?;

    let live = session
        .create_live_stock(NewLiveStock {
            master_id: master.id,
            chemical_name: master.chemical_name.clone(),
            display_name: identity::base_name(&chemical_name).to_string(),
            unit: entry.unit.clone(),
            expiry_date: entry.expiry_date,
            quantity: entry.quantity,
            original_quantity: entry.quantity,
            pool_id: PoolId::Central,
            is_allocated: false,
        })
        .await?;

    session
        .record_transaction(NewTransaction {
            chemical_name: master.chemical_name.clone(),
            kind: TransactionKind::Entry,
            live_stock_id: live.id,
            source_pool: PoolId::Central,
            destination_pool: PoolId::Central,
            quantity: entry.quantity,
            unit: entry.unit.clone(),
            actor_id: actor,
        })
        .await?;

    Ok(master)
}

/// Merge an entry into an existing lot with the identical identity.
async fn merge_into(
    session: &mut dyn LedgerSession,
    actor: ActorId,
    entry: &IntakeEntry,
    record: MasterRecord,
) -> Result<MasterRecord, LedgerError> {
    let updated = session
        .update_master(
            record.id,
            MasterUpdate {
                rename: None,
                add_quantity: Some(entry.quantity),
            },
        )
        .await?;

    let live = session
        .find_live_stock(record.id, PoolId::Central)
        .await?
        .ok_or_else(|| {
            LedgerError::DataCorruption(format!(
                "central live stock missing for master {}",
                record.id
            ))
        })?;
    session
        .add_live_quantity(live.id, entry.quantity, entry.quantity)
        .await?;

    session
        .record_transaction(NewTransaction {
            chemical_name: updated.chemical_name.clone(),
            kind: TransactionKind::Entry,
            live_stock_id: live.id,
            source_pool: PoolId::Central,
            destination_pool: PoolId::Central,
            quantity: entry.quantity,
            unit: entry.unit.clone(),
            actor_id: actor,
        })
        .await?;

    Ok(updated)
}

/// Generate a fresh batch identifier: `BATCH-YYYYMMDD-###`.
///
/// The numeric component is random, not sequential; the collision risk is
/// accepted for this system's volumes.
fn generate_batch_id() -> String {
    let date = Utc::now().format("%Y%m%d");
    let random: u16 = rand::rng().random_range(0..1000);
    format!("BATCH-{date}-{random:03}")
}
