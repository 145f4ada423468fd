//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::StockLedger;
use crate::services::{AllocationService, IntakeService, ReportService};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    ledger: Arc<dyn StockLedger>,
}

impl AppState {
    /// Build state over a ledger backend.
    #[must_use]
    pub fn new(config: ServerConfig, ledger: Arc<dyn StockLedger>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, ledger }),
        }
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// The ledger backend.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn StockLedger> {
        &self.inner.ledger
    }

    /// Batch intake engine over the ledger.
    #[must_use]
    pub fn intake(&self) -> IntakeService {
        IntakeService::new(Arc::clone(&self.inner.ledger))
    }

    /// Allocation engine over the ledger.
    #[must_use]
    pub fn allocation(&self) -> AllocationService {
        AllocationService::new(Arc::clone(&self.inner.ledger))
    }

    /// Read projections over the ledger.
    #[must_use]
    pub fn reports(&self) -> ReportService {
        ReportService::new(Arc::clone(&self.inner.ledger))
    }
}
