//! In-process ledger backend.
//!
//! Holds the whole store behind one async mutex. A session takes the lock
//! for its lifetime and clones the state up front; rollback restores the
//! clone. That makes sessions fully serializable, which is a strictly
//! stronger guarantee than the production backend needs to offer - racing
//! allocations still observe the conditional-decrement semantics the
//! engines rely on.
//!
//! This backend powers the test suites and local demos; it is not meant to
//! survive a process restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use chemstock_core::{LabId, LiveStockId, MasterRecordId, PoolId, TransactionId};

use super::{LedgerError, LedgerSession, StockLedger};
use crate::models::{
    LiveStock, MasterRecord, MasterUpdate, NewLiveStock, NewMasterRecord, NewTransaction,
    StockTransaction,
};
use crate::services::identity;

/// Everything the ledger holds. Rows are kept in creation order.
#[derive(Debug, Clone, Default)]
struct MemoryState {
    masters: Vec<MasterRecord>,
    live: Vec<LiveStock>,
    transactions: Vec<StockTransaction>,
    next_master_id: i32,
    next_live_id: i32,
    next_transaction_id: i32,
}

impl MemoryState {
    fn next_master_id(&mut self) -> MasterRecordId {
        self.next_master_id += 1;
        MasterRecordId::new(self.next_master_id)
    }

    fn next_live_id(&mut self) -> LiveStockId {
        self.next_live_id += 1;
        LiveStockId::new(self.next_live_id)
    }

    fn next_transaction_id(&mut self) -> TransactionId {
        self.next_transaction_id += 1;
        TransactionId::new(self.next_transaction_id)
    }
}

/// In-process stock ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockLedger for MemoryLedger {
    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerSession>, LedgerError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemorySession { guard, snapshot }))
    }

    async fn latest_batch_id(&self) -> Result<Option<String>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.masters.last().map(|m| m.batch_id.clone()))
    }

    async fn list_masters(&self) -> Result<Vec<MasterRecord>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.masters.iter().rev().cloned().collect())
    }

    async fn live_stock_for_pool(&self, pool: PoolId) -> Result<Vec<LiveStock>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .live
            .iter()
            .filter(|row| row.pool_id == pool)
            .cloned()
            .collect())
    }

    async fn all_live_stock(&self) -> Result<Vec<LiveStock>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.live.clone())
    }

    async fn list_transactions(&self) -> Result<Vec<StockTransaction>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.transactions.iter().rev().cloned().collect())
    }
}

/// A session over the in-process store: exclusive access for its lifetime,
/// with a pre-mutation snapshot for rollback.
struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: MemoryState,
}

#[async_trait]
impl LedgerSession for MemorySession {
    async fn find_matching_masters(
        &mut self,
        base_name: &str,
        vendor: &str,
        unit: &str,
    ) -> Result<Vec<MasterRecord>, LedgerError> {
        Ok(self
            .guard
            .masters
            .iter()
            .filter(|record| {
                record.vendor == vendor
                    && record.unit == unit
                    && identity::is_name_variant(base_name, &record.chemical_name)
            })
            .cloned()
            .collect())
    }

    async fn create_master(&mut self, new: NewMasterRecord) -> Result<MasterRecord, LedgerError> {
        let record = MasterRecord {
            id: self.guard.next_master_id(),
            chemical_name: new.chemical_name,
            quantity: new.quantity,
            unit: new.unit,
            expiry_date: new.expiry_date,
            batch_id: new.batch_id,
            vendor: new.vendor,
            price_per_unit: new.price_per_unit,
            department: new.department,
            created_at: Utc::now(),
        };
        self.guard.masters.push(record.clone());
        Ok(record)
    }

    async fn update_master(
        &mut self,
        id: MasterRecordId,
        update: MasterUpdate,
    ) -> Result<MasterRecord, LedgerError> {
        let record = self
            .guard
            .masters
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(LedgerError::NotFound)?;
        if let Some(name) = update.rename {
            record.chemical_name = name;
        }
        if let Some(delta) = update.add_quantity {
            record.quantity += delta;
        }
        Ok(record.clone())
    }

    async fn create_live_stock(&mut self, new: NewLiveStock) -> Result<LiveStock, LedgerError> {
        if self
            .guard
            .live
            .iter()
            .any(|row| row.master_id == new.master_id && row.pool_id == new.pool_id)
        {
            return Err(LedgerError::Conflict(format!(
                "live stock already exists for master {} in pool {}",
                new.master_id, new.pool_id
            )));
        }
        let row = LiveStock {
            id: self.guard.next_live_id(),
            master_id: new.master_id,
            chemical_name: new.chemical_name,
            display_name: new.display_name,
            unit: new.unit,
            expiry_date: new.expiry_date,
            quantity: new.quantity,
            original_quantity: new.original_quantity,
            pool_id: new.pool_id,
            is_allocated: new.is_allocated,
        };
        self.guard.live.push(row.clone());
        Ok(row)
    }

    async fn find_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
    ) -> Result<Option<LiveStock>, LedgerError> {
        Ok(self
            .guard
            .live
            .iter()
            .find(|row| row.master_id == master_id && row.pool_id == pool)
            .cloned())
    }

    async fn rename_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
        chemical_name: &str,
    ) -> Result<(), LedgerError> {
        for row in self
            .guard
            .live
            .iter_mut()
            .filter(|row| row.master_id == master_id && row.pool_id == pool)
        {
            row.chemical_name = chemical_name.to_string();
        }
        Ok(())
    }

    async fn add_live_quantity(
        &mut self,
        id: LiveStockId,
        delta: Decimal,
        original_delta: Decimal,
    ) -> Result<(), LedgerError> {
        let row = self
            .guard
            .live
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(LedgerError::NotFound)?;
        row.quantity += delta;
        row.original_quantity += original_delta;
        Ok(())
    }

    async fn draw_central_stock(
        &mut self,
        display_name: &str,
        amount: Decimal,
    ) -> Result<Option<LiveStock>, LedgerError> {
        let chosen = self
            .guard
            .live
            .iter_mut()
            .filter(|row| {
                row.pool_id.is_central()
                    && row.display_name == display_name
                    && row.quantity >= amount
            })
            .min_by_key(|row| (row.expiry_date, row.id));

        Ok(chosen.map(|row| {
            row.quantity -= amount;
            row.clone()
        }))
    }

    async fn upsert_lab_stock(
        &mut self,
        source: &LiveStock,
        lab: LabId,
        amount: Decimal,
    ) -> Result<LiveStock, LedgerError> {
        let pool = PoolId::Lab(lab);
        if let Some(row) = self
            .guard
            .live
            .iter_mut()
            .find(|row| row.master_id == source.master_id && row.pool_id == pool)
        {
            row.quantity += amount;
            return Ok(row.clone());
        }

        let row = LiveStock {
            id: self.guard.next_live_id(),
            master_id: source.master_id,
            chemical_name: source.chemical_name.clone(),
            display_name: source.display_name.clone(),
            unit: source.unit.clone(),
            expiry_date: source.expiry_date,
            quantity: amount,
            original_quantity: amount,
            pool_id: pool,
            is_allocated: true,
        };
        self.guard.live.push(row.clone());
        Ok(row)
    }

    async fn record_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<StockTransaction, LedgerError> {
        let transaction = StockTransaction {
            id: self.guard.next_transaction_id(),
            chemical_name: new.chemical_name,
            kind: new.kind,
            live_stock_id: new.live_stock_id,
            source_pool: new.source_pool,
            destination_pool: new.destination_pool,
            quantity: new.quantity,
            unit: new.unit,
            actor_id: new.actor_id,
            recorded_at: Utc::now(),
        };
        self.guard.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        // Mutations happened in place; releasing the lock publishes them.
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LedgerError> {
        *self.guard = self.snapshot;
        Ok(())
    }
}
