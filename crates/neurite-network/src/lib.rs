//! Units, connections, and pluggable update actions for Neurite networks.
//!
//! A [`Network`] owns its units and connections (in a [`NetworkCore`])
//! and an [`UpdateManager`] listing the [`UpdateAction`]s applied each
//! step:
//!
//! - [`BufferedUpdate`]: every unit reads the previous step's values;
//!   optionally fanned out over a [`WorkerPool`](neurite_pool::WorkerPool).
//! - [`PriorityUpdate`]: units update one at a time in priority order,
//!   seeing same-step values of earlier units.
//! - [`GroupUpdate`]: delegates to a [`GroupUpdatable`] aggregate.
//! - [`CustomUpdate`]: logic resolved by name through a [`ScriptResolver`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod buffered;
pub mod connection;
pub mod custom;
pub mod error;
pub mod group;
pub mod manager;
pub mod network;
pub mod priority;
pub mod state;
pub mod unit;

pub use action::{ActionSpec, ClosureAction, UpdateAction};
pub use buffered::{BufferedUpdate, DEFAULT_CHUNK_SIZE};
pub use connection::{Connection, ConnectionContext, ConnectionRule, HebbianRule, StaticStrength};
pub use custom::{CustomState, CustomUpdate, ScriptRegistry, ScriptResolver};
pub use error::NetworkError;
pub use group::{GroupUpdatable, GroupUpdate, WinnerTakeAll};
pub use manager::UpdateManager;
pub use network::Network;
pub use priority::PriorityUpdate;
pub use state::{FanIn, NetworkCore};
pub use unit::{FnRule, LinearRule, Unit, UnitContext, UnitRule};
