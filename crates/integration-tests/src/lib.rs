//! Shared fixtures for the ChemStock integration tests.
//!
//! Everything runs against the in-memory ledger backend, which offers the
//! same transactional semantics as the production store, so the suites need
//! no external services.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

use chemstock_core::ActorId;
use chemstock_server::config::ServerConfig;
use chemstock_server::db::{MemoryLedger, StockLedger};
use chemstock_server::services::{
    AllocationRequest, AllocationService, IntakeEntry, IntakeRequest, IntakeService,
};
use chemstock_server::state::AppState;

/// A fresh, empty in-memory ledger.
#[must_use]
pub fn ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new())
}

/// A random verified actor.
#[must_use]
pub fn actor() -> ActorId {
    ActorId::new(Uuid::new_v4())
}

/// A configuration suitable for tests (never actually connects anywhere).
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/chemstock_test".to_string()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Application state over the given ledger.
#[must_use]
pub fn app_state(ledger: Arc<MemoryLedger>) -> AppState {
    let ledger: Arc<dyn StockLedger> = ledger;
    AppState::new(test_config(), ledger)
}

/// Intake engine over the given ledger.
#[must_use]
pub fn intake_service(ledger: &Arc<MemoryLedger>) -> IntakeService {
    IntakeService::new(Arc::clone(ledger) as Arc<dyn StockLedger>)
}

/// Allocation engine over the given ledger.
#[must_use]
pub fn allocation_service(ledger: &Arc<MemoryLedger>) -> AllocationService {
    AllocationService::new(Arc::clone(ledger) as Arc<dyn StockLedger>)
}

/// Date helper.
///
/// # Panics
///
/// Panics on an invalid calendar date.
#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An intake entry with test defaults (vendor "Merck", unit "L").
#[must_use]
pub fn entry(name: &str, quantity: i64, expiry: NaiveDate) -> IntakeEntry {
    IntakeEntry {
        chemical_name: name.to_string(),
        quantity: Decimal::from(quantity),
        unit: "L".to_string(),
        expiry_date: expiry,
        vendor: "Merck".to_string(),
        price_per_unit: Decimal::from(2),
        department: "Chemistry".to_string(),
    }
}

/// A single-entry intake request with a fresh batch id.
#[must_use]
pub fn single_intake(name: &str, quantity: i64, expiry: NaiveDate) -> IntakeRequest {
    IntakeRequest {
        entries: vec![entry(name, quantity, expiry)],
        use_previous_batch_id: false,
    }
}

/// An allocation request.
#[must_use]
pub fn request(name: &str, quantity: i64) -> AllocationRequest {
    AllocationRequest {
        chemical_name: name.to_string(),
        quantity: Decimal::from(quantity),
    }
}
