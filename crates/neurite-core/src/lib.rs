//! Core types for the Neurite simulation update engine.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! identifiers, coupling values, and error taxonomy shared by the pool,
//! network, and workspace crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod guard;
pub mod id;
pub mod value;

pub use error::{
    ConfigError, CouplingError, PartError, PoolError, ScriptResolutionError, StepError,
    UpdateLogicError,
};
pub use guard::{catch_panic, lock_recover, panic_message};
pub use id::{
    ComponentId, ConnectionId, CouplingId, NetworkInstanceId, PoolInstanceId, StepId, UnitId,
};
pub use value::AttributeValue;
