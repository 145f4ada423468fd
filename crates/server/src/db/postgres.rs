//! `PostgreSQL` ledger backend.
//!
//! Sessions wrap a database transaction; a session dropped without an
//! explicit end rolls back with it. Queries use the runtime sqlx API with
//! internal row types converted into the domain models.
//!
//! The FIFO draw is a single `UPDATE ... WHERE id = (SELECT ... FOR UPDATE)`
//! statement so that choosing the earliest-expiry row and decrementing it is
//! one atomic step; the one-row-per-`(master, pool)` invariant is a unique
//! index backing the allocation upsert.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use chemstock_core::{ActorId, LabId, LiveStockId, MasterRecordId, PoolId, TransactionId};

use super::{LedgerError, LedgerSession, StockLedger};
use crate::models::{
    LiveStock, MasterRecord, MasterUpdate, NewLiveStock, NewMasterRecord, NewTransaction,
    StockTransaction, TransactionKind,
};
use crate::services::identity;

/// Unique index guarding the one-row-per-`(master, pool)` invariant.
const LIVE_STOCK_POOL_CONSTRAINT: &str = "idx_live_stock_master_pool";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for master record queries.
#[derive(Debug, sqlx::FromRow)]
struct MasterRow {
    id: i32,
    chemical_name: String,
    quantity: Decimal,
    unit: String,
    expiry_date: NaiveDate,
    batch_id: String,
    vendor: String,
    price_per_unit: Decimal,
    department: String,
    created_at: DateTime<Utc>,
}

impl From<MasterRow> for MasterRecord {
    fn from(row: MasterRow) -> Self {
        Self {
            id: MasterRecordId::new(row.id),
            chemical_name: row.chemical_name,
            quantity: row.quantity,
            unit: row.unit,
            expiry_date: row.expiry_date,
            batch_id: row.batch_id,
            vendor: row.vendor,
            price_per_unit: row.price_per_unit,
            department: row.department,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for live stock queries.
#[derive(Debug, sqlx::FromRow)]
struct LiveStockRow {
    id: i32,
    master_id: i32,
    chemical_name: String,
    display_name: String,
    unit: String,
    expiry_date: NaiveDate,
    quantity: Decimal,
    original_quantity: Decimal,
    pool_id: String,
    is_allocated: bool,
}

impl TryFrom<LiveStockRow> for LiveStock {
    type Error = LedgerError;

    fn try_from(row: LiveStockRow) -> Result<Self, Self::Error> {
        let pool_id = row
            .pool_id
            .parse::<PoolId>()
            .map_err(|e| LedgerError::DataCorruption(e.to_string()))?;
        Ok(Self {
            id: LiveStockId::new(row.id),
            master_id: MasterRecordId::new(row.master_id),
            chemical_name: row.chemical_name,
            display_name: row.display_name,
            unit: row.unit,
            expiry_date: row.expiry_date,
            quantity: row.quantity,
            original_quantity: row.original_quantity,
            pool_id,
            is_allocated: row.is_allocated,
        })
    }
}

/// Internal row type for audit transaction queries.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i32,
    chemical_name: String,
    kind: String,
    live_stock_id: i32,
    source_pool: String,
    destination_pool: String,
    quantity: Decimal,
    unit: String,
    actor_id: Uuid,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for StockTransaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<TransactionKind>()
            .map_err(LedgerError::DataCorruption)?;
        let source_pool = row
            .source_pool
            .parse::<PoolId>()
            .map_err(|e| LedgerError::DataCorruption(e.to_string()))?;
        let destination_pool = row
            .destination_pool
            .parse::<PoolId>()
            .map_err(|e| LedgerError::DataCorruption(e.to_string()))?;
        Ok(Self {
            id: TransactionId::new(row.id),
            chemical_name: row.chemical_name,
            kind,
            live_stock_id: LiveStockId::new(row.live_stock_id),
            source_pool,
            destination_pool,
            quantity: row.quantity,
            unit: row.unit,
            actor_id: ActorId::new(row.actor_id),
            recorded_at: row.recorded_at,
        })
    }
}

const LIVE_STOCK_COLUMNS: &str = "id, master_id, chemical_name, display_name, unit, \
     expiry_date, quantity, original_quantity, pool_id, is_allocated";

// =============================================================================
// Ledger
// =============================================================================

/// `PostgreSQL`-backed stock ledger.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a ledger over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockLedger for PgLedger {
    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerSession>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn latest_batch_id(&self) -> Result<Option<String>, LedgerError> {
        let row: Option<(String,)> = sqlx::query_as(
            r"
            SELECT batch_id FROM master_record
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn list_masters(&self) -> Result<Vec<MasterRecord>, LedgerError> {
        let rows = sqlx::query_as::<_, MasterRow>(
            r"
            SELECT id, chemical_name, quantity, unit, expiry_date, batch_id,
                   vendor, price_per_unit, department, created_at
            FROM master_record
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn live_stock_for_pool(&self, pool: PoolId) -> Result<Vec<LiveStock>, LedgerError> {
        let rows = sqlx::query_as::<_, LiveStockRow>(&format!(
            "SELECT {LIVE_STOCK_COLUMNS} FROM live_stock WHERE pool_id = $1 ORDER BY id"
        ))
        .bind(pool.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn all_live_stock(&self) -> Result<Vec<LiveStock>, LedgerError> {
        let rows = sqlx::query_as::<_, LiveStockRow>(&format!(
            "SELECT {LIVE_STOCK_COLUMNS} FROM live_stock ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_transactions(&self) -> Result<Vec<StockTransaction>, LedgerError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r"
            SELECT id, chemical_name, kind, live_stock_id, source_pool,
                   destination_pool, quantity, unit, actor_id, recorded_at
            FROM stock_transaction
            ORDER BY recorded_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// =============================================================================
// Session
// =============================================================================

/// One database transaction.
struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerSession for PgSession {
    async fn find_matching_masters(
        &mut self,
        base_name: &str,
        vendor: &str,
        unit: &str,
    ) -> Result<Vec<MasterRecord>, LedgerError> {
        // The LIKE prefix can only over-match (wildcards in the submitted
        // name widen it); the precise suffix-variant rule is applied below.
        let rows = sqlx::query_as::<_, MasterRow>(
            r"
            SELECT id, chemical_name, quantity, unit, expiry_date, batch_id,
                   vendor, price_per_unit, department, created_at
            FROM master_record
            WHERE vendor = $2 AND unit = $3
              AND lower(chemical_name) LIKE lower($1) || '%'
            ORDER BY id
            ",
        )
        .bind(base_name)
        .bind(vendor)
        .bind(unit)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(MasterRecord::from)
            .filter(|record| identity::is_name_variant(base_name, &record.chemical_name))
            .collect())
    }

    async fn create_master(&mut self, new: NewMasterRecord) -> Result<MasterRecord, LedgerError> {
        let row = sqlx::query_as::<_, MasterRow>(
            r"
            INSERT INTO master_record (
                chemical_name, quantity, unit, expiry_date, batch_id,
                vendor, price_per_unit, department
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, chemical_name, quantity, unit, expiry_date, batch_id,
                      vendor, price_per_unit, department, created_at
            ",
        )
        .bind(&new.chemical_name)
        .bind(new.quantity)
        .bind(&new.unit)
        .bind(new.expiry_date)
        .bind(&new.batch_id)
        .bind(&new.vendor)
        .bind(new.price_per_unit)
        .bind(&new.department)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn update_master(
        &mut self,
        id: MasterRecordId,
        update: MasterUpdate,
    ) -> Result<MasterRecord, LedgerError> {
        let row = sqlx::query_as::<_, MasterRow>(
            r"
            UPDATE master_record
            SET chemical_name = COALESCE($2::text, chemical_name),
                quantity = quantity + COALESCE($3::numeric, 0)
            WHERE id = $1
            RETURNING id, chemical_name, quantity, unit, expiry_date, batch_id,
                      vendor, price_per_unit, department, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(update.rename)
        .bind(update.add_quantity)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::NotFound)?;

        Ok(row.into())
    }

    async fn create_live_stock(&mut self, new: NewLiveStock) -> Result<LiveStock, LedgerError> {
        let row = sqlx::query_as::<_, LiveStockRow>(&format!(
            r"
            INSERT INTO live_stock (
                master_id, chemical_name, display_name, unit, expiry_date,
                quantity, original_quantity, pool_id, is_allocated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LIVE_STOCK_COLUMNS}
            "
        ))
        .bind(new.master_id.as_i32())
        .bind(&new.chemical_name)
        .bind(&new.display_name)
        .bind(&new.unit)
        .bind(new.expiry_date)
        .bind(new.quantity)
        .bind(new.original_quantity)
        .bind(new.pool_id.as_str())
        .bind(new.is_allocated)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(LIVE_STOCK_POOL_CONSTRAINT)
            {
                return LedgerError::Conflict(format!(
                    "live stock already exists for master {} in pool {}",
                    new.master_id, new.pool_id
                ));
            }
            LedgerError::Database(e)
        })?;

        row.try_into()
    }

    async fn find_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
    ) -> Result<Option<LiveStock>, LedgerError> {
        let row = sqlx::query_as::<_, LiveStockRow>(&format!(
            "SELECT {LIVE_STOCK_COLUMNS} FROM live_stock WHERE master_id = $1 AND pool_id = $2"
        ))
        .bind(master_id.as_i32())
        .bind(pool.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn rename_live_stock(
        &mut self,
        master_id: MasterRecordId,
        pool: PoolId,
        chemical_name: &str,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r"
            UPDATE live_stock SET chemical_name = $3
            WHERE master_id = $1 AND pool_id = $2
            ",
        )
        .bind(master_id.as_i32())
        .bind(pool.as_str())
        .bind(chemical_name)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn add_live_quantity(
        &mut self,
        id: LiveStockId,
        delta: Decimal,
        original_delta: Decimal,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r"
            UPDATE live_stock
            SET quantity = quantity + $2, original_quantity = original_quantity + $3
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .bind(delta)
        .bind(original_delta)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound);
        }
        Ok(())
    }

    async fn draw_central_stock(
        &mut self,
        display_name: &str,
        amount: Decimal,
    ) -> Result<Option<LiveStock>, LedgerError> {
        // Locate-and-decrement in one statement: the row lock taken by the
        // inner SELECT makes racing draws re-evaluate the quantity guard, so
        // the last unit can only be spent once.
        let row = sqlx::query_as::<_, LiveStockRow>(&format!(
            r"
            UPDATE live_stock
            SET quantity = quantity - $2
            WHERE id = (
                SELECT id FROM live_stock
                WHERE pool_id = $3 AND display_name = $1 AND quantity >= $2
                ORDER BY expiry_date ASC, id ASC
                LIMIT 1
                FOR UPDATE
            )
            RETURNING {LIVE_STOCK_COLUMNS}
            "
        ))
        .bind(display_name)
        .bind(amount)
        .bind(PoolId::Central.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn upsert_lab_stock(
        &mut self,
        source: &LiveStock,
        lab: LabId,
        amount: Decimal,
    ) -> Result<LiveStock, LedgerError> {
        let row = sqlx::query_as::<_, LiveStockRow>(&format!(
            r"
            INSERT INTO live_stock (
                master_id, chemical_name, display_name, unit, expiry_date,
                quantity, original_quantity, pool_id, is_allocated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, TRUE)
            ON CONFLICT (master_id, pool_id)
            DO UPDATE SET quantity = live_stock.quantity + EXCLUDED.quantity
            RETURNING {LIVE_STOCK_COLUMNS}
            "
        ))
        .bind(source.master_id.as_i32())
        .bind(&source.chemical_name)
        .bind(&source.display_name)
        .bind(&source.unit)
        .bind(source.expiry_date)
        .bind(amount)
        .bind(PoolId::Lab(lab).as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn record_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<StockTransaction, LedgerError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r"
            INSERT INTO stock_transaction (
                chemical_name, kind, live_stock_id, source_pool,
                destination_pool, quantity, unit, actor_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, chemical_name, kind, live_stock_id, source_pool,
                      destination_pool, quantity, unit, actor_id, recorded_at
            ",
        )
        .bind(&new.chemical_name)
        .bind(new.kind.as_str())
        .bind(new.live_stock_id.as_i32())
        .bind(new.source_pool.as_str())
        .bind(new.destination_pool.as_str())
        .bind(new.quantity)
        .bind(&new.unit)
        .bind(new.actor_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
