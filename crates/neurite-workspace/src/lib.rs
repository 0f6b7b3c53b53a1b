//! Workspace scheduling for Neurite simulations.
//!
//! A [`Workspace`] holds heterogeneous [`Component`]s and the
//! [`Coupling`]s that copy attribute values between them. Each tick of
//! the [`WorkspaceUpdater`] runs its [`StepActionManager`]; the default
//! action runs every component's [`UpdatePart`]s on a worker pool, waits
//! for all of them, and only then fires the couplings. A [`Driver`] repeats ticks in the foreground or on a
//! background thread, and a [`SimulationContext`] owns the whole stack.
//!
//! Networks join a workspace through [`NetworkComponent`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod component;
pub mod config;
pub mod context;
pub mod coupling;
pub mod driver;
pub mod metrics;
pub mod network_component;
pub mod schedule;
pub mod updater;
pub mod workspace;

pub use component::{Component, PartLock, UpdatePart};
pub use config::{DriverConfig, SimulationConfig, UpdaterConfig};
pub use context::{ShutdownReport, SimulationContext};
pub use coupling::{AttributeRef, Coupling, CouplingUpdate};
pub use driver::{Driver, DriverError, RunReport, StopReason};
pub use metrics::StepMetrics;
pub use network_component::NetworkComponent;
pub use schedule::{
    BufferedStep, ClosureStep, ComponentCouplingStep, ComponentStep, CouplingDirection,
    CouplingStep, StepAction, StepActionManager,
};
pub use updater::{
    PartEvent, ResizeError, StepReport, StepScope, UpdaterListener, UpdaterState,
    WorkspaceUpdater,
};
pub use workspace::Workspace;
