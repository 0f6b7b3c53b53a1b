//! Network construction errors.

use std::error::Error;
use std::fmt;

use neurite_core::UnitId;

/// Errors from building or addressing a [`Network`](crate::Network).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkError {
    /// The unit does not exist in this network.
    UnknownUnit {
        /// The missing unit.
        unit: UnitId,
    },
    /// The network already holds `u32::MAX` units or connections.
    CapacityExceeded,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUnit { unit } => write!(f, "unit {unit} does not exist"),
            Self::CapacityExceeded => write!(f, "network id space exhausted"),
        }
    }
}

impl Error for NetworkError {}
