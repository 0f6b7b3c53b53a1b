//! Neurite: a simulation update engine for interacting neural networks.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Neurite sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use neurite::prelude::*;
//!
//! // n1 (clamped at 0.5) -> n2 -> n3, swept in priority order.
//! let mut net = Network::new("demo");
//! let n1 = net.add_unit(LinearRule::identity()).unwrap();
//! let n2 = net.add_unit(LinearRule::identity()).unwrap();
//! let n3 = net.add_unit(LinearRule::identity()).unwrap();
//! net.connect(n1, n2, 1.0).unwrap();
//! net.connect(n2, n3, 1.0).unwrap();
//! net.set_priority(n1, 1).unwrap();
//! net.set_priority(n2, 2).unwrap();
//! net.set_priority(n3, 3).unwrap();
//! net.set_value(n1, 0.5).unwrap();
//! net.set_clamped(n1, true).unwrap();
//! net.set_action(Box::new(PriorityUpdate::new()));
//!
//! // Step it inside a workspace.
//! let config = SimulationConfig {
//!     updater: UpdaterConfig::sequential(),
//!     unit_pool: PoolConfig::with_workers(1),
//!     ..SimulationConfig::default()
//! };
//! let ctx = SimulationContext::new(config).unwrap();
//! let (_, net) = ctx.add_network(net);
//! let report = ctx.tick().unwrap();
//! assert_eq!(report.step, StepId(1));
//! assert_eq!(net.lock().unwrap().value(n3), Some(0.5));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `neurite-core` | IDs, attribute values, errors, panic containment |
//! | [`pool`] | `neurite-pool` | Worker pool, barrier passes, completion latch |
//! | [`network`] | `neurite-network` | Units, connections, rules, update actions |
//! | [`workspace`] | `neurite-workspace` | Components, couplings, updater, driver, context |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and errors (`neurite-core`).
pub use neurite_core as types;

/// The worker pool (`neurite-pool`).
///
/// [`pool::WorkerPool::run_pass`] runs a batch of tasks behind a barrier;
/// [`pool::WorkerPool::submit`] dispatches one task with no barrier.
pub use neurite_pool as pool;

/// Networks and update actions (`neurite-network`).
pub use neurite_network as network;

/// Workspace scheduling (`neurite-workspace`).
///
/// Most programs start from [`workspace::SimulationContext`].
pub use neurite_workspace as workspace;

/// Common imports for typical Neurite usage.
///
/// ```rust
/// use neurite::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use neurite_core::{AttributeValue, ComponentId, ConnectionId, StepId, UnitId};

    // Errors
    pub use neurite_core::{
        ConfigError, CouplingError, PartError, PoolError, ScriptResolutionError, StepError,
        UpdateLogicError,
    };

    // Pool
    pub use neurite_pool::{PoolConfig, WorkerPool};

    // Network
    pub use neurite_network::{
        ActionSpec, BufferedUpdate, ConnectionRule, CustomUpdate, GroupUpdate, HebbianRule,
        LinearRule, Network, NetworkError, PriorityUpdate, ScriptRegistry, UnitRule,
        UpdateAction, UpdateManager, WinnerTakeAll,
    };

    // Workspace
    pub use neurite_workspace::{
        AttributeRef, Component, Driver, SimulationConfig, SimulationContext, StepAction,
        StepActionManager, StepMetrics, StepReport, UpdatePart, UpdaterConfig, Workspace,
        WorkspaceUpdater,
    };
}
