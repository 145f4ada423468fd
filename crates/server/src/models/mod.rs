//! Domain models for the stock ledger.

pub mod live_stock;
pub mod master;
pub mod transaction;

pub use live_stock::{LiveStock, NewLiveStock};
pub use master::{MasterRecord, MasterUpdate, NewMasterRecord};
pub use transaction::{NewTransaction, StockTransaction, TransactionKind};
