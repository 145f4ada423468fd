//! Integration tests for batch intake reconciliation.
//!
//! These exercise identity resolution end to end against the in-memory
//! ledger: fresh lots, exact-match merges, expiry disambiguation and the
//! invariants the engine must preserve.

use std::collections::HashMap;

use rust_decimal::Decimal;

use chemstock_core::{MasterRecordId, PoolId};
use chemstock_integration_tests::{
    actor, date, entry, intake_service, ledger, single_intake,
};
use chemstock_server::db::StockLedger;
use chemstock_server::models::TransactionKind;
use chemstock_server::services::IntakeRequest;

// =============================================================================
// Fresh Lots
// =============================================================================

#[tokio::test]
async fn fresh_entry_creates_master_live_and_audit_row() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    let outcome = intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.batch_id.starts_with("BATCH-"));

    let masters = ledger.list_masters().await.unwrap();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].chemical_name, "Acetone");
    assert_eq!(masters[0].quantity, Decimal::from(10));
    assert_eq!(masters[0].batch_id, outcome.batch_id);

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert_eq!(central.len(), 1);
    assert_eq!(central[0].display_name, "Acetone");
    assert_eq!(central[0].quantity, Decimal::from(10));
    assert_eq!(central[0].original_quantity, Decimal::from(10));
    assert!(!central[0].is_allocated);

    let transactions = ledger.list_transactions().await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, TransactionKind::Entry);
    assert_eq!(transactions[0].live_stock_id, central[0].id);
    assert_eq!(transactions[0].source_pool, PoolId::Central);
    assert_eq!(transactions[0].destination_pool, PoolId::Central);
}

#[tokio::test]
async fn different_vendors_stay_separate_lots() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();

    let mut other_vendor = single_intake("Acetone", 5, date(2026, 1, 1));
    other_vendor.entries[0].vendor = "Sigma".to_string();
    intake.intake(actor(), other_vendor).await.unwrap();

    // No identity overlap, so neither lot is suffixed.
    let masters = ledger.list_masters().await.unwrap();
    assert_eq!(masters.len(), 2);
    assert!(masters.iter().all(|m| m.chemical_name == "Acetone"));
}

// =============================================================================
// Exact-Match Merges
// =============================================================================

#[tokio::test]
async fn identical_identity_merges_additively() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    let second = intake
        .intake(actor(), single_intake("Acetone", 5, date(2025, 1, 1)))
        .await
        .unwrap();

    // No new master; the existing lot grew.
    let masters = ledger.list_masters().await.unwrap();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].quantity, Decimal::from(15));
    assert_eq!(second.records[0].id, masters[0].id);

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert_eq!(central.len(), 1);
    assert_eq!(central[0].quantity, Decimal::from(15));
    assert_eq!(central[0].original_quantity, Decimal::from(15));

    // One audit row per quantity change.
    assert_eq!(ledger.list_transactions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn merge_matches_names_case_insensitively() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    intake
        .intake(actor(), single_intake("ACETONE", 5, date(2025, 1, 1)))
        .await
        .unwrap();

    let masters = ledger.list_masters().await.unwrap();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].quantity, Decimal::from(15));
}

// =============================================================================
// Expiry Disambiguation
// =============================================================================

#[tokio::test]
async fn later_expiry_suffixes_the_new_lot() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    intake
        .intake(actor(), single_intake("Acetone", 5, date(2026, 6, 1)))
        .await
        .unwrap();

    let mut names: Vec<String> = ledger
        .list_masters()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.chemical_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Acetone", "Acetone - A"]);

    // Suffixes never leak into display names.
    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    assert!(central.iter().all(|row| row.display_name == "Acetone"));
}

#[tokio::test]
async fn earlier_expiry_takes_the_bare_name() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    let outcome = intake
        .intake(actor(), single_intake("Acetone", 5, date(2024, 6, 1)))
        .await
        .unwrap();

    // The earlier-expiring newcomer keeps the base name; the existing lot
    // was pushed to a suffix, live row in lockstep.
    assert_eq!(outcome.records[0].chemical_name, "Acetone");

    let masters = ledger.list_masters().await.unwrap();
    let renamed = masters
        .iter()
        .find(|m| m.expiry_date == date(2025, 1, 1))
        .unwrap();
    assert_eq!(renamed.chemical_name, "Acetone - A");

    let central = ledger.live_stock_for_pool(PoolId::Central).await.unwrap();
    let by_master: HashMap<MasterRecordId, &str> = central
        .iter()
        .map(|row| (row.master_id, row.chemical_name.as_str()))
        .collect();
    assert_eq!(by_master[&renamed.id], "Acetone - A");
    assert!(central.iter().all(|row| row.display_name == "Acetone"));
}

#[tokio::test]
async fn suffixes_increase_in_letter_order() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    // Ever-later expiries: each newcomer takes the next letter.
    for (year, qty) in [(2025, 10), (2026, 5), (2027, 3)] {
        intake
            .intake(actor(), single_intake("Acetone", qty, date(year, 1, 1)))
            .await
            .unwrap();
    }

    let mut names: Vec<String> = ledger
        .list_masters()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.chemical_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Acetone", "Acetone - A", "Acetone - B"]);
}

// =============================================================================
// Batch Identifiers
// =============================================================================

#[tokio::test]
async fn previous_batch_id_is_reused() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    let first = intake
        .intake(actor(), single_intake("Acetone", 10, date(2025, 1, 1)))
        .await
        .unwrap();
    let second = intake
        .intake(
            actor(),
            IntakeRequest {
                entries: vec![entry("Ethanol", 5, date(2025, 3, 1))],
                use_previous_batch_id: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(second.batch_id, first.batch_id);
}

#[tokio::test]
async fn previous_batch_id_falls_back_on_empty_ledger() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    let outcome = intake
        .intake(
            actor(),
            IntakeRequest {
                entries: vec![entry("Acetone", 10, date(2025, 1, 1))],
                use_previous_batch_id: true,
            },
        )
        .await
        .unwrap();

    assert!(outcome.batch_id.starts_with("BATCH-"));
}

// =============================================================================
// Invariants
// =============================================================================

#[tokio::test]
async fn central_quantities_never_exceed_master_totals() {
    let ledger = ledger();
    let intake = intake_service(&ledger);

    let batches = [
        ("Acetone", 10, date(2025, 1, 1)),
        ("Acetone", 5, date(2025, 1, 1)),
        ("Acetone", 3, date(2026, 1, 1)),
        ("Ethanol", 7, date(2024, 9, 1)),
        ("Acetone", 2, date(2023, 12, 1)),
    ];
    for (name, qty, expiry) in batches {
        intake
            .intake(actor(), single_intake(name, qty, expiry))
            .await
            .unwrap();
    }

    let masters = ledger.list_masters().await.unwrap();
    let live = ledger.all_live_stock().await.unwrap();
    for master in &masters {
        let held: Decimal = live
            .iter()
            .filter(|row| row.master_id == master.id)
            .map(|row| row.quantity)
            .sum();
        assert!(
            held <= master.quantity,
            "pool quantities for {} exceed the master total",
            master.chemical_name
        );
    }

    // Every quantity change produced exactly one audit row.
    assert_eq!(
        ledger.list_transactions().await.unwrap().len(),
        batches.len()
    );
}
