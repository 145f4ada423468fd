//! Stock route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chemstock_core::{LabId, MasterRecordId, PoolId};

use crate::error::AppError;
use crate::middleware::VerifiedActor;
use crate::models::{LiveStock, MasterRecord, StockTransaction};
use crate::services::{AllocationRequest, AllocationResult, IntakeEntry, IntakeRequest};
use crate::state::AppState;

/// Request body for batch intake.
#[derive(Debug, Deserialize)]
pub struct IntakePayload {
    /// Entries to reconcile.
    pub chemicals: Vec<IntakeEntry>,
    /// Reuse the most recent batch id instead of generating a fresh one.
    #[serde(default)]
    pub use_previous_batch_id: bool,
}

/// Response body for batch intake.
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub message: String,
    pub batch_id: String,
    pub chemicals: Vec<MasterRecord>,
}

/// Request body for allocation.
#[derive(Debug, Deserialize)]
pub struct AllocatePayload {
    /// Target lab identifier (e.g. `"LAB01"`).
    pub lab_id: String,
    /// Requests, processed in order.
    pub allocations: Vec<AllocationRequest>,
}

/// Response body for allocation.
#[derive(Debug, Serialize)]
pub struct AllocateResponse {
    pub message: String,
    pub succeeded: bool,
    pub results: Vec<AllocationResult>,
}

/// Live stock view: hides the suffixed chemical name behind the display
/// name.
#[derive(Debug, Serialize)]
pub struct LiveStockView {
    pub master_id: MasterRecordId,
    pub display_name: String,
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    pub unit: String,
    pub expiry_date: NaiveDate,
    pub pool_id: PoolId,
    pub is_allocated: bool,
}

impl From<LiveStock> for LiveStockView {
    fn from(row: LiveStock) -> Self {
        Self {
            master_id: row.master_id,
            display_name: row.display_name,
            quantity: row.quantity,
            original_quantity: row.original_quantity,
            unit: row.unit,
            expiry_date: row.expiry_date,
            pool_id: row.pool_id,
            is_allocated: row.is_allocated,
        }
    }
}

/// Reconcile a batch of entries into the central pool.
#[instrument(skip(state, payload), fields(entries = payload.chemicals.len()))]
pub async fn intake(
    State(state): State<AppState>,
    VerifiedActor(actor): VerifiedActor,
    Json(payload): Json<IntakePayload>,
) -> Result<impl IntoResponse, AppError> {
    validate_entries(&payload.chemicals)?;

    let outcome = state
        .intake()
        .intake(
            actor,
            IntakeRequest {
                entries: payload.chemicals,
                use_previous_batch_id: payload.use_previous_batch_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IntakeResponse {
            message: "Chemicals added/updated successfully".to_string(),
            batch_id: outcome.batch_id,
            chemicals: outcome.records,
        }),
    ))
}

/// Allocate stock to a lab, all-or-nothing.
#[instrument(skip(state, payload), fields(lab = %payload.lab_id, requests = payload.allocations.len()))]
pub async fn allocate(
    State(state): State<AppState>,
    VerifiedActor(actor): VerifiedActor,
    Json(payload): Json<AllocatePayload>,
) -> Result<impl IntoResponse, AppError> {
    let lab = payload
        .lab_id
        .parse::<LabId>()
        .map_err(|_| AppError::BadRequest(format!("invalid lab id: {}", payload.lab_id)))?;
    if payload.allocations.is_empty() {
        return Err(AppError::BadRequest("no allocations provided".to_string()));
    }

    let outcome = state
        .allocation()
        .allocate(actor, lab, payload.allocations)
        .await?;

    let (status, message) = if outcome.succeeded {
        (StatusCode::OK, "All allocations completed successfully")
    } else {
        (StatusCode::CONFLICT, "Some allocations failed; nothing was persisted")
    };

    Ok((
        status,
        Json(AllocateResponse {
            message: message.to_string(),
            succeeded: outcome.succeeded,
            results: outcome.results,
        }),
    ))
}

/// All master records, newest first.
pub async fn master_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<MasterRecord>>, AppError> {
    Ok(Json(state.ledger().list_masters().await?))
}

/// Central live stock.
pub async fn central_live(
    State(state): State<AppState>,
) -> Result<Json<Vec<LiveStockView>>, AppError> {
    let rows = state.ledger().live_stock_for_pool(PoolId::Central).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Central stock reduced to the allocation-form feed.
pub async fn central_simplified(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.reports().central_simplified().await?))
}

/// Live stock for one lab.
pub async fn lab_live(
    State(state): State<AppState>,
    Path(lab_id): Path<String>,
) -> Result<Json<Vec<LiveStockView>>, AppError> {
    let lab = parse_lab(&lab_id)?;
    let rows = state.ledger().live_stock_for_pool(PoolId::Lab(lab)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Master records referenced by one lab's live stock.
pub async fn lab_masters(
    State(state): State<AppState>,
    Path(lab_id): Path<String>,
) -> Result<Json<Vec<MasterRecord>>, AppError> {
    let lab = parse_lab(&lab_id)?;
    Ok(Json(state.reports().lab_masters(lab).await?))
}

/// The audit log, newest first.
pub async fn transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<StockTransaction>>, AppError> {
    Ok(Json(state.ledger().list_transactions().await?))
}

/// Per-pool distribution summary.
pub async fn distribution(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.reports().distribution(today).await?))
}

fn parse_lab(raw: &str) -> Result<LabId, AppError> {
    raw.parse::<LabId>()
        .map_err(|_| AppError::BadRequest(format!("invalid lab id: {raw}")))
}

fn validate_entries(entries: &[IntakeEntry]) -> Result<(), AppError> {
    if entries.is_empty() {
        return Err(AppError::BadRequest("no chemicals provided".to_string()));
    }
    for entry in entries {
        if entry.chemical_name.trim().is_empty() {
            return Err(AppError::BadRequest("chemical name is required".to_string()));
        }
        if entry.unit.trim().is_empty() {
            return Err(AppError::BadRequest("unit is required".to_string()));
        }
        if entry.vendor.trim().is_empty() {
            return Err(AppError::BadRequest("vendor is required".to_string()));
        }
        if entry.quantity <= Decimal::ZERO {
            return Err(AppError::BadRequest(format!(
                "quantity must be positive for {}",
                entry.chemical_name
            )));
        }
        if entry.price_per_unit < Decimal::ZERO {
            return Err(AppError::BadRequest(format!(
                "price must not be negative for {}",
                entry.chemical_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn entry(name: &str, quantity: i64) -> IntakeEntry {
        IntakeEntry {
            chemical_name: name.to_string(),
            quantity: Decimal::from(quantity),
            unit: "L".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            vendor: "Vendor".to_string(),
            price_per_unit: Decimal::ONE,
            department: "Chemistry".to_string(),
        }
    }

    #[test]
    fn empty_batches_are_rejected() {
        assert!(validate_entries(&[]).is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_entries(&[entry("  ", 5)]).is_err());
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(validate_entries(&[entry("Acetone", 0)]).is_err());
        assert!(validate_entries(&[entry("Acetone", -3)]).is_err());
    }

    #[test]
    fn well_formed_entries_pass() {
        assert!(validate_entries(&[entry("Acetone", 5)]).is_ok());
    }
}
