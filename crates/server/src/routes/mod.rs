//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness check
//! GET  /health/ready                     - Readiness check (pings the ledger)
//!
//! # Stock
//! POST /api/stock/intake                 - Reconcile a batch of entries into central
//! POST /api/stock/allocate               - Allocate stock to a lab (all-or-nothing)
//! GET  /api/stock/master                 - All master records
//! GET  /api/stock/central/live           - Central live stock
//! GET  /api/stock/central/simplified     - Allocation-form feed
//! GET  /api/stock/labs/{lab_id}/live     - Lab live stock
//! GET  /api/stock/labs/{lab_id}/master   - Masters referenced by a lab
//! GET  /api/stock/transactions           - Audit log
//! GET  /api/stock/distribution           - Per-pool distribution summary
//! ```
//!
//! Write endpoints require the verified `x-actor-id` header; request
//! validation happens here, before anything reaches the engines.

pub mod stock;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        // Stock
        .route("/api/stock/intake", post(stock::intake))
        .route("/api/stock/allocate", post(stock::allocate))
        .route("/api/stock/master", get(stock::master_list))
        .route("/api/stock/central/live", get(stock::central_live))
        .route("/api/stock/central/simplified", get(stock::central_simplified))
        .route("/api/stock/labs/{lab_id}/live", get(stock::lab_live))
        .route("/api/stock/labs/{lab_id}/master", get(stock::lab_masters))
        .route("/api/stock/transactions", get(stock::transactions))
        .route("/api/stock/distribution", get(stock::distribution))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies ledger connectivity before returning OK.
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.ledger().ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
