//! Business logic: identity resolution, batch intake, allocation and the
//! read projections the API surface exposes.

pub mod allocation;
pub mod identity;
pub mod intake;
pub mod reports;

pub use allocation::{
    AllocationFailure, AllocationOutcome, AllocationRequest, AllocationResult, AllocationService,
    AllocationStatus,
};
pub use intake::{IntakeEntry, IntakeOutcome, IntakeRequest, IntakeService};
pub use reports::{PoolChemical, PoolDistribution, ReportService, SimplifiedStock};
