//! Stock pool identifiers.
//!
//! A pool is a physical stock location: the central repository or one of the
//! fixed set of lab stores. Lab identifiers are a closed enum so an unknown
//! lab can never reach the allocation path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Wire identifier of the central pool.
const CENTRAL_POOL: &str = "central-lab";

/// Error returned when parsing a pool or lab identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pool identifier: {0}")]
pub struct ParsePoolError(pub String);

/// One of the fixed lab stock locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabId {
    Lab01,
    Lab02,
    Lab03,
    Lab04,
    Lab05,
    Lab06,
    Lab07,
    Lab08,
}

impl LabId {
    /// Every recognized lab, in identifier order.
    pub const ALL: [Self; 8] = [
        Self::Lab01,
        Self::Lab02,
        Self::Lab03,
        Self::Lab04,
        Self::Lab05,
        Self::Lab06,
        Self::Lab07,
        Self::Lab08,
    ];

    /// The wire identifier for this lab (e.g. `"LAB01"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lab01 => "LAB01",
            Self::Lab02 => "LAB02",
            Self::Lab03 => "LAB03",
            Self::Lab04 => "LAB04",
            Self::Lab05 => "LAB05",
            Self::Lab06 => "LAB06",
            Self::Lab07 => "LAB07",
            Self::Lab08 => "LAB08",
        }
    }
}

impl fmt::Display for LabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabId {
    type Err = ParsePoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lab| lab.as_str() == s)
            .ok_or_else(|| ParsePoolError(s.to_string()))
    }
}

impl Serialize for LabId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LabId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A stock pool: the central repository or one lab's local stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolId {
    /// The central repository. Always the source of allocations, never a
    /// target.
    Central,
    /// One lab's local stock.
    Lab(LabId),
}

impl PoolId {
    /// Every pool, central first.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut pools = vec![Self::Central];
        pools.extend(LabId::ALL.into_iter().map(Self::Lab));
        pools
    }

    /// The wire identifier for this pool.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Central => CENTRAL_POOL,
            Self::Lab(lab) => lab.as_str(),
        }
    }

    /// Whether this is the central repository.
    #[must_use]
    pub const fn is_central(&self) -> bool {
        matches!(self, Self::Central)
    }
}

impl From<LabId> for PoolId {
    fn from(lab: LabId) -> Self {
        Self::Lab(lab)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolId {
    type Err = ParsePoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CENTRAL_POOL {
            return Ok(Self::Central);
        }
        s.parse::<LabId>().map(Self::Lab)
    }
}

impl Serialize for PoolId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PoolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
