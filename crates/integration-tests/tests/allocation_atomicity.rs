//! Integration tests for the allocation engine.
//!
//! FIFO-by-expiry draws, the all-or-nothing batch contract, and behavior
//! under concurrent demand for the same lot.

use rust_decimal::Decimal;

use chemstock_core::{LabId, PoolId};
use chemstock_integration_tests::{
    actor, allocation_service, date, intake_service, ledger, request, single_intake,
};
use chemstock_server::db::StockLedger;
use chemstock_server::models::TransactionKind;
use chemstock_server::services::{AllocationFailure, AllocationStatus};

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn allocations_move_quantity_and_leave_an_audit_trail() {
    let ledger = ledger();
    intake_service(&ledger)
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    let allocation = allocation_service(&ledger);

    let first = allocation
        .allocate(actor(), LabId::Lab01, vec![request("Acetone", 4)])
        .await
        .unwrap();
    let second = allocation
        .allocate(actor(), LabId::Lab02, vec![request("Acetone", 4)])
        .await
        .unwrap();
    assert!(first.succeeded);
    assert!(second.succeeded);

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert_eq!(central[0].quantity, Decimal::from(2));

    for lab in [LabId::Lab01, LabId::Lab02] {
        let rows = ledger.live_stock_for_pool(PoolId::Lab(lab)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, Decimal::from(4));
        assert_eq!(rows[0].original_quantity, Decimal::from(4));
        assert_eq!(rows[0].display_name, "Acetone");
        assert!(rows[0].is_allocated);
    }

    let allocations: Vec<_> = ledger
        .list_transactions()
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Allocation)
        .collect();
    assert_eq!(allocations.len(), 2);
    assert!(allocations.iter().all(|t| t.source_pool == PoolId::Central));

    // A third draw for more than what's left fails.
    let third = allocation
        .allocate(actor(), LabId::Lab03, vec![request("Acetone", 5)])
        .await
        .unwrap();
    assert!(!third.succeeded);
    assert_eq!(
        third.results[0].status,
        AllocationStatus::Failed {
            reason: AllocationFailure::InsufficientStock
        }
    );
}

#[tokio::test]
async fn draws_come_from_the_earliest_expiry_lot() {
    let ledger = ledger();
    let intake = intake_service(&ledger);
    // Second intake expires earlier, so it takes the bare name and the 2026
    // lot moves to "Acetone - A"; both display as "Acetone".
    intake
        .intake(actor(), single_intake("Acetone", 10, date(2026, 1, 1)))
        .await
        .unwrap();
    intake
        .intake(actor(), single_intake("Acetone", 10, date(2024, 6, 1)))
        .await
        .unwrap();

    let outcome = allocation_service(&ledger)
        .allocate(actor(), LabId::Lab01, vec![request("Acetone", 5)])
        .await
        .unwrap();

    assert!(outcome.succeeded);
    assert_eq!(
        outcome.results[0].status,
        AllocationStatus::Allocated {
            allocated_quantity: Decimal::from(5),
            expiry_date: date(2024, 6, 1),
        }
    );

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    let drained = central
        .iter()
        .find(|row| row.expiry_date == date(2024, 6, 1))
        .unwrap();
    let untouched = central
        .iter()
        .find(|row| row.expiry_date == date(2026, 1, 1))
        .unwrap();
    assert_eq!(drained.quantity, Decimal::from(5));
    assert_eq!(untouched.quantity, Decimal::from(10));
}

#[tokio::test]
async fn repeat_allocations_reuse_the_lab_row() {
    let ledger = ledger();
    intake_service(&ledger)
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    let allocation = allocation_service(&ledger);

    allocation
        .allocate(actor(), LabId::Lab01, vec![request("Acetone", 3)])
        .await
        .unwrap();
    allocation
        .allocate(actor(), LabId::Lab01, vec![request("Acetone", 4)])
        .await
        .unwrap();

    // Still exactly one row for this (master, pool) pair; the first receipt
    // pins original_quantity.
    let rows = ledger
        .live_stock_for_pool(PoolId::Lab(LabId::Lab01))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, Decimal::from(7));
    assert_eq!(rows[0].original_quantity, Decimal::from(3));
}

// =============================================================================
// All-Or-Nothing
// =============================================================================

#[tokio::test]
async fn one_failing_request_rolls_back_the_whole_batch() {
    let ledger = ledger();
    intake_service(&ledger)
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();

    let masters_before = ledger.list_masters().await.unwrap();
    let live_before = ledger.all_live_stock().await.unwrap();
    let transactions_before = ledger.list_transactions().await.unwrap();

    let outcome = allocation_service(&ledger)
        .allocate(
            actor(),
            LabId::Lab01,
            vec![request("Acetone", 4), request("Ethanol", 1)],
        )
        .await
        .unwrap();

    // The caller still sees what would have happened to each request.
    assert!(!outcome.succeeded);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(
        outcome.results[0].status,
        AllocationStatus::Allocated {
            allocated_quantity: Decimal::from(4),
            expiry_date: date(2025, 1, 1),
        }
    );
    assert_eq!(
        outcome.results[1].status,
        AllocationStatus::Failed {
            reason: AllocationFailure::InsufficientStock
        }
    );

    // ...but the ledger is byte-for-byte what it was before the call.
    assert_eq!(ledger.list_masters().await.unwrap(), masters_before);
    assert_eq!(ledger.all_live_stock().await.unwrap(), live_before);
    assert_eq!(
        ledger.list_transactions().await.unwrap(),
        transactions_before
    );
}

#[tokio::test]
async fn non_positive_quantities_fail_their_request() {
    let ledger = ledger();
    intake_service(&ledger)
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();

    let outcome = allocation_service(&ledger)
        .allocate(
            actor(),
            LabId::Lab01,
            vec![request("Acetone", 0), request("Acetone", 2)],
        )
        .await
        .unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.results[0].status,
        AllocationStatus::Failed {
            reason: AllocationFailure::InvalidQuantity
        }
    );
    // Nothing moved.
    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert_eq!(central[0].quantity, Decimal::from(10));
}

#[tokio::test]
async fn a_single_lot_must_cover_the_whole_request() {
    let ledger = ledger();
    let intake = intake_service(&ledger);
    // Two 5-unit lots of the same chemical; a request for 8 is never split
    // across them.
    intake
        .intake(actor(), single_intake("Acetone", 5, date(2025, 1, 1)))
        .await
        .unwrap();
    intake
        .intake(actor(), single_intake("Acetone", 5, date(2026, 1, 1)))
        .await
        .unwrap();

    let outcome = allocation_service(&ledger)
        .allocate(actor(), LabId::Lab01, vec![request("Acetone", 8)])
        .await
        .unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.results[0].status,
        AllocationStatus::Failed {
            reason: AllocationFailure::InsufficientStock
        }
    );
}

#[tokio::test]
async fn unknown_chemicals_report_insufficient_stock() {
    let ledger = ledger();

    let outcome = allocation_service(&ledger)
        .allocate(actor(), LabId::Lab05, vec![request("Unobtainium", 1)])
        .await
        .unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.results[0].status,
        AllocationStatus::Failed {
            reason: AllocationFailure::InsufficientStock
        }
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn racing_allocations_never_overdraw_a_lot() {
    let ledger = ledger();
    intake_service(&ledger)
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();

    // Combined demand (5 x 3) exceeds supply (10): exactly three calls can
    // be served.
    let labs = [
        LabId::Lab01,
        LabId::Lab02,
        LabId::Lab03,
        LabId::Lab04,
        LabId::Lab05,
    ];
    let mut handles = Vec::new();
    for lab in labs {
        let service = allocation_service(&ledger);
        handles.push(tokio::spawn(async move {
            service
                .allocate(actor(), lab, vec![request("Acetone", 3)])
                .await
                .unwrap()
        }));
    }

    let mut succeeded = 0;
    let mut failed = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.succeeded {
            succeeded += 1;
        } else {
            failed += 1;
            assert_eq!(
                outcome.results[0].status,
                AllocationStatus::Failed {
                    reason: AllocationFailure::InsufficientStock
                }
            );
        }
    }
    assert_eq!(succeeded, 3);
    assert_eq!(failed, 2);

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert_eq!(central[0].quantity, Decimal::from(1));
    assert!(central[0].quantity >= Decimal::ZERO);
}
