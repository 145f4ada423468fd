//! The stock ledger - the transactional record store behind the engines.
//!
//! The ledger is an external collaborator: the intake and allocation engines
//! only ever talk to the [`StockLedger`] / [`LedgerSession`] traits, never to
//! a concrete store. Two backends exist:
//!
//! - [`postgres::PgLedger`] - the production backend (sqlx / `PostgreSQL`);
//!   migrations live in `crates/server/migrations/` and run via
//!   `chemstock-cli migrate`
//! - [`memory::MemoryLedger`] - an in-process backend with the same
//!   transactional semantics, used by the test suites and for local demos
//!
//! # Concurrency contract
//!
//! [`LedgerSession::draw_central_stock`] is the FIFO-lock primitive: matching
//! a row with sufficient quantity, choosing the earliest expiry and
//! decrementing it must happen as one conditional update. Two racing
//! allocations of the last unit must never both observe sufficient stock.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use chemstock_core::{LabId, LiveStockId, MasterRecordId, PoolId};

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::models::{
    LiveStock, MasterRecord, MasterUpdate, NewLiveStock, NewMasterRecord, NewTransaction,
    StockTransaction,
};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate live stock row).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// The transactional record store holding master records, live stock
/// projections and the audit log.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Check that the store is reachable (readiness probe).
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the store cannot be reached.
    async fn ping(&self) -> Result<(), LedgerError>;

    /// Open a transactional session. All writes go through a session;
    /// dropping one without committing discards its changes.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if a transaction cannot be started.
    async fn begin(&self) -> Result<Box<dyn LedgerSession>, LedgerError>;

    /// Batch id of the most recently created master record, if any.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn latest_batch_id(&self) -> Result<Option<String>, LedgerError>;

    /// All master records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn list_masters(&self) -> Result<Vec<MasterRecord>, LedgerError>;

    /// Live stock rows for one pool.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn live_stock_for_pool(&self, pool: PoolId) -> Result<Vec<LiveStock>, LedgerError>;

    /// Live stock rows across every pool.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn all_live_stock(&self) -> Result<Vec<LiveStock>, LedgerError>;

    /// The audit log, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn list_transactions(&self) -> Result<Vec<StockTransaction>, LedgerError>;
}

/// One transaction scope against the ledger.
///
/// A session either ends in [`commit`](Self::commit) or
/// [`rollback`](Self::rollback); both consume it. Backends roll back
/// sessions that are dropped without an explicit end.
#[async_trait]
pub trait LedgerSession: Send {
    /// Master records whose stored name matches `base_name` or a
    /// single-letter suffix variant of it (case-insensitive), with the same
    /// vendor and unit.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn find_matching_masters(
        &mut self,
        base_name: &str,
        vendor: &str,
        unit: &str,
    ) -> Result<Vec<MasterRecord>, LedgerError>;

    /// Create a master record.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the insert fails.
    async fn create_master(&mut self, new: NewMasterRecord) -> Result<MasterRecord, LedgerError>;

    /// Apply a rename and/or quantity increment to a master record and
    /// return the updated record.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the record doesn't exist.
    /// Returns `LedgerError::Database` for other failures.
    async fn update_master(
        &mut self,
        id: MasterRecordId,
        update: MasterUpdate,
    ) -> Result<MasterRecord, LedgerError>;

    /// Create a live stock row.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Conflict` if a row already exists for the same
    /// `(master, pool)` pair. Returns `LedgerError::Database` otherwise.
    async fn create_live_stock(&mut self, new: NewLiveStock) -> Result<LiveStock, LedgerError>;

    /// Live stock row for one `(master, pool)` pair, if present.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the query fails.
    async fn find_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
    ) -> Result<Option<LiveStock>, LedgerError>;

    /// Keep a live stock row's chemical name in lockstep with a renamed
    /// master. The display name is untouched.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the update fails.
    async fn rename_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
        chemical_name: &str,
    ) -> Result<(), LedgerError>;

    /// Add to a live stock row's available and cumulative quantities.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the row doesn't exist.
    /// Returns `LedgerError::Database` for other failures.
    async fn add_live_quantity(
        &mut self,
        id: LiveStockId,
        delta: Decimal,
        original_delta: Decimal,
    ) -> Result<(), LedgerError>;

    /// The FIFO-lock primitive: find the central-pool row matching
    /// `display_name` with `quantity >= amount`, earliest expiry first, and
    /// decrement it by `amount` - all as one conditional update. Returns the
    /// decremented row, or `None` when no row qualifies.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the update fails.
    async fn draw_central_stock(
        &mut self,
        display_name: &str,
        amount: Decimal,
    ) -> Result<Option<LiveStock>, LedgerError>;

    /// Credit `amount` to a lab's row for the master behind `source`:
    /// insert a fresh allocated row (quantity = cumulative = `amount`)
    /// copying names/unit/expiry from the source, or increment the existing
    /// row's available quantity only.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the upsert fails.
    async fn upsert_lab_stock(
        &mut self,
        source: &LiveStock,
        lab: LabId,
        amount: Decimal,
    ) -> Result<LiveStock, LedgerError>;

    /// Append an audit transaction.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the insert fails.
    async fn record_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<StockTransaction, LedgerError>;

    /// Persist every change made through this session.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the commit fails.
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    /// Discard every change made through this session.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` if the rollback fails.
    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    use secrecy::ExposeSecret;

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
