//! Allocation: move quantity from the central pool to a lab pool.
//!
//! The whole request list runs inside one ledger session. Every request is
//! attempted (so the caller gets a complete result list), but the session
//! only commits when all of them succeeded - one failure rolls back
//! everything, including requests that had already been applied.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chemstock_core::{ActorId, LabId, PoolId};

use crate::db::{LedgerError, LedgerSession, StockLedger};
use crate::models::{NewTransaction, TransactionKind};

/// One allocation request: draw this much of a chemical for the target lab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Clean display name of the chemical (never suffixed).
    pub chemical_name: String,
    /// Quantity to allocate; must be positive.
    pub quantity: Decimal,
}

/// Why an individual request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationFailure {
    /// The requested quantity was zero or negative.
    InvalidQuantity,
    /// No central lot holds enough of the chemical - or a racing allocation
    /// got there first; the two are indistinguishable to the caller.
    InsufficientStock,
}

impl fmt::Display for AllocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantity => f.write_str("invalid quantity"),
            Self::InsufficientStock => f.write_str("insufficient stock or not found"),
        }
    }
}

/// Outcome of one request within an allocation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationStatus {
    /// The draw succeeded (persisted only if the whole batch committed).
    Allocated {
        /// Quantity drawn.
        allocated_quantity: Decimal,
        /// Expiry date of the lot the quantity came from.
        expiry_date: NaiveDate,
    },
    /// The request failed.
    Failed {
        /// Failure reason.
        reason: AllocationFailure,
    },
}

/// Per-request result, labeled with the chemical it was for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    /// Chemical the request named.
    pub chemical_name: String,
    /// What happened.
    #[serde(flatten)]
    pub status: AllocationStatus,
}

/// Result of a whole allocation call.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    /// True when every request succeeded and the batch committed.
    pub succeeded: bool,
    /// Per-request results in caller order. When `succeeded` is false these
    /// describe what would have happened; nothing was persisted.
    pub results: Vec<AllocationResult>,
}

/// Allocation engine.
pub struct AllocationService {
    ledger: Arc<dyn StockLedger>,
}

impl AllocationService {
    /// Create a new allocation service.
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self { ledger }
    }

    /// Allocate a batch of requests to `lab`, all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` when the store fails; the session is rolled
    /// back first.
    #[instrument(skip(self, requests), fields(lab = %lab, requests = requests.len(), actor = %actor))]
    pub async fn allocate(
        &self,
        actor: ActorId,
        lab: LabId,
        requests: Vec<AllocationRequest>,
    ) -> Result<AllocationOutcome, LedgerError> {
        let mut session = self.ledger.begin().await?;
        let mut results = Vec::with_capacity(requests.len());
        let mut succeeded = true;

        for request in &requests {
            let status = match apply_request(session.as_mut(), actor, lab, request).await {
                Ok(status) => status,
                Err(e) => {
                    session.rollback().await?;
                    return Err(e);
                }
            };
            if matches!(status, AllocationStatus::Failed { .. }) {
                succeeded = false;
            }
            results.push(AllocationResult {
                chemical_name: request.chemical_name.clone(),
                status,
            });
        }

        if succeeded {
            session.commit().await?;
            tracing::info!(lab = %lab, allocations = results.len(), "Allocation batch committed");
        } else {
            session.rollback().await?;
            tracing::warn!(lab = %lab, "Allocation batch rolled back; reporting per-request results");
        }

        Ok(AllocationOutcome { succeeded, results })
    }
}

/// Apply one request inside the open session.
async fn apply_request(
    session: &mut dyn LedgerSession,
    actor: ActorId,
    lab: LabId,
    request: &AllocationRequest,
) -> Result<AllocationStatus, LedgerError> {
    if request.quantity <= Decimal::ZERO {
        return Ok(AllocationStatus::Failed {
            reason: AllocationFailure::InvalidQuantity,
        });
    }

    let Some(source) = session
        .draw_central_stock(&request.chemical_name, request.quantity)
        .await?
    else {
        return Ok(AllocationStatus::Failed {
            reason: AllocationFailure::InsufficientStock,
        });
    };

    let lab_row = session
        .upsert_lab_stock(&source, lab, request.quantity)
        .await?;

    session
        .record_transaction(NewTransaction {
            chemical_name: source.chemical_name.clone(),
            kind: TransactionKind::Allocation,
            live_stock_id: lab_row.id,
            source_pool: PoolId::Central,
            destination_pool: PoolId::Lab(lab),
            quantity: request.quantity,
            unit: source.unit.clone(),
            actor_id: actor,
        })
        .await?;

    Ok(AllocationStatus::Allocated {
        allocated_quantity: request.quantity,
        expiry_date: source.expiry_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_serialize_with_a_status_tag() {
        let allocated = AllocationResult {
            chemical_name: "Acetone".to_string(),
            status: AllocationStatus::Allocated {
                allocated_quantity: Decimal::from(4),
                expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
        };
        let value = serde_json::to_value(&allocated).unwrap();
        assert_eq!(value["chemical_name"], "Acetone");
        assert_eq!(value["status"], "allocated");
        assert_eq!(value["allocated_quantity"], "4");
        assert_eq!(value["expiry_date"], "2025-01-01");

        let failed = AllocationResult {
            chemical_name: "Ethanol".to_string(),
            status: AllocationStatus::Failed {
                reason: AllocationFailure::InsufficientStock,
            },
        };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "insufficient_stock");
    }

    #[test]
    fn failure_reasons_read_like_the_api_contract() {
        assert_eq!(
            AllocationFailure::InsufficientStock.to_string(),
            "insufficient stock or not found"
        );
    }
}
