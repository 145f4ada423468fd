//! Core types for ChemStock.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod actor;
pub mod id;
pub mod pool;

pub use actor::ActorId;
pub use id::*;
pub use pool::{LabId, ParsePoolError, PoolId};
