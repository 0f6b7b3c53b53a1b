//! Error types for the Neurite update engine.
//!
//! Organized by where the error is recovered: update logic (recovered
//! inside the enclosing task), worker pool (fatal to one pass), script
//! resolution (recovered as a no-op), couplings (recovered by dropping
//! the coupling), and the workspace step itself.

use std::error::Error;
use std::fmt;

use crate::id::{ComponentId, CouplingId};

/// An error raised by unit, connection, group, or component update logic.
///
/// Never propagates past the task that ran the logic. The affected
/// element contributes no change for the step.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateLogicError {
    /// A rule or callable reported a failure.
    Rule {
        /// What was being updated (e.g. `"unit 4"`).
        origin: String,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A rule produced a NaN or infinite value.
    NonFinite {
        /// What was being updated.
        origin: String,
        /// The rejected value.
        value: f64,
    },
    /// The logic panicked; the panic was contained.
    Panicked {
        /// What was being updated.
        origin: String,
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl UpdateLogicError {
    /// Convenience constructor for [`UpdateLogicError::Rule`].
    pub fn rule(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rule {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Replace the element the error is attributed to.
    pub fn with_origin(self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        match self {
            Self::Rule { reason, .. } => Self::Rule { origin, reason },
            Self::NonFinite { value, .. } => Self::NonFinite { origin, value },
            Self::Panicked { message, .. } => Self::Panicked { origin, message },
        }
    }

    /// The element the error was raised for.
    pub fn origin(&self) -> &str {
        match self {
            Self::Rule { origin, .. }
            | Self::NonFinite { origin, .. }
            | Self::Panicked { origin, .. } => origin,
        }
    }
}

impl fmt::Display for UpdateLogicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule { origin, reason } => write!(f, "{origin}: {reason}"),
            Self::NonFinite { origin, value } => {
                write!(f, "{origin}: produced non-finite value {value}")
            }
            Self::Panicked { origin, message } => write!(f, "{origin}: panicked: {message}"),
        }
    }
}

impl Error for UpdateLogicError {}

/// Errors from the worker pool.
///
/// [`PoolError::WorkerLost`] is the pool-exhaustion case: fatal to the
/// pass that observed it, never to the pool or the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// A worker thread terminated while a pass was waiting on it.
    WorkerLost {
        /// Index of the lost worker.
        worker: usize,
    },
    /// The barrier did not release within the configured timeout.
    BarrierTimeout {
        /// How long the dispatcher waited, in milliseconds.
        waited_ms: u64,
        /// Participants that had arrived when the wait was abandoned.
        arrived: usize,
        /// Participants the barrier was sized for.
        expected: usize,
    },
    /// A barrier pass was dispatched from one of the pool's own workers.
    Reentrant,
    /// The pool has been shut down.
    ShutDown,
    /// A worker thread could not be spawned.
    SpawnFailed {
        /// Description of the spawn failure.
        reason: String,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerLost { worker } => write!(f, "worker {worker} terminated mid-pass"),
            Self::BarrierTimeout {
                waited_ms,
                arrived,
                expected,
            } => write!(
                f,
                "barrier timed out after {waited_ms}ms ({arrived}/{expected} arrived)"
            ),
            Self::Reentrant => write!(f, "barrier pass dispatched from a worker of the same pool"),
            Self::ShutDown => write!(f, "worker pool is shut down"),
            Self::SpawnFailed { reason } => write!(f, "worker spawn failed: {reason}"),
        }
    }
}

impl Error for PoolError {}

/// A custom update action's logic could not be resolved at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptResolutionError {
    /// No logic is registered under the given name.
    NotFound {
        /// The script reference that failed to resolve.
        script: String,
    },
    /// The resolver found the script but refused to build it.
    Rejected {
        /// The script reference.
        script: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl fmt::Display for ScriptResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { script } => write!(f, "script '{script}' not found"),
            Self::Rejected { script, reason } => {
                write!(f, "script '{script}' rejected: {reason}")
            }
        }
    }
}

impl Error for ScriptResolutionError {}

/// Errors raised while creating or running a coupling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CouplingError {
    /// An endpoint's component has been removed from the workspace.
    ComponentRemoved {
        /// The invalidated coupling.
        coupling: CouplingId,
        /// The component that is gone.
        component: ComponentId,
    },
    /// The referenced component was never registered.
    UnknownComponent {
        /// The missing component.
        component: ComponentId,
    },
    /// The component does not expose the named attribute.
    AttributeMissing {
        /// The component that was asked.
        component: ComponentId,
        /// The attribute name.
        attribute: String,
    },
    /// The consumer refused the value.
    AttributeRejected {
        /// The attribute name.
        attribute: String,
        /// Why it was refused.
        reason: String,
    },
}

impl fmt::Display for CouplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComponentRemoved {
                coupling,
                component,
            } => write!(
                f,
                "coupling {coupling} references removed component {component}"
            ),
            Self::UnknownComponent { component } => {
                write!(f, "component {component} is not registered")
            }
            Self::AttributeMissing {
                component,
                attribute,
            } => write!(f, "component {component} has no attribute '{attribute}'"),
            Self::AttributeRejected { attribute, reason } => {
                write!(f, "attribute '{attribute}' rejected value: {reason}")
            }
        }
    }
}

impl Error for CouplingError {}

/// Failure of one component update part.
///
/// Recorded by the workspace updater and counted in step metrics; never
/// fails the tick.
#[derive(Clone, Debug, PartialEq)]
pub enum PartError {
    /// The part's logic failed.
    Logic(UpdateLogicError),
    /// A nested barrier pass was abandoned; the part's step is incomplete.
    Incomplete(PoolError),
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logic(e) => write!(f, "update logic: {e}"),
            Self::Incomplete(e) => write!(f, "incomplete step: {e}"),
        }
    }
}

impl Error for PartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logic(e) => Some(e),
            Self::Incomplete(e) => Some(e),
        }
    }
}

impl From<UpdateLogicError> for PartError {
    fn from(e: UpdateLogicError) -> Self {
        Self::Logic(e)
    }
}

impl From<PoolError> for PartError {
    fn from(e: PoolError) -> Self {
        Self::Incomplete(e)
    }
}

/// Errors that prevent a workspace step from being dispatched at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// The simulation is shutting down.
    ShuttingDown,
    /// The component pool refused work.
    Pool(PoolError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShuttingDown => write!(f, "simulation is shutting down"),
            Self::Pool(e) => write!(f, "component pool: {e}"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pool(e) => Some(e),
            Self::ShuttingDown => None,
        }
    }
}

impl From<PoolError> for StepError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::ShutDown => Self::ShuttingDown,
            other => Self::Pool(other),
        }
    }
}

/// Errors detected while validating configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// An explicit thread or worker count of zero.
    ZeroWorkers,
    /// A polling interval of zero milliseconds.
    ZeroPollInterval,
    /// A barrier timeout of zero milliseconds.
    ZeroBarrierTimeout,
    /// A chunk size of zero units.
    ZeroChunkSize,
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroWorkers => write!(f, "worker count must be at least 1"),
            Self::ZeroPollInterval => write!(f, "liveness_poll_ms must be at least 1"),
            Self::ZeroBarrierTimeout => {
                write!(f, "barrier_timeout_ms must be at least 1 when set")
            }
            Self::ZeroChunkSize => write!(f, "chunk_size must be at least 1"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}

impl From<PoolError> for ConfigError {
    fn from(e: PoolError) -> Self {
        Self::ThreadSpawnFailed {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_shutdown_maps_to_shutting_down() {
        assert_eq!(StepError::from(PoolError::ShutDown), StepError::ShuttingDown);
        assert_eq!(
            StepError::from(PoolError::Reentrant),
            StepError::Pool(PoolError::Reentrant)
        );
    }

    #[test]
    fn part_error_chains_source() {
        let e = PartError::from(PoolError::WorkerLost { worker: 2 });
        let src = e.source().expect("source");
        assert_eq!(src.to_string(), "worker 2 terminated mid-pass");
    }

    #[test]
    fn logic_error_origin() {
        let e = UpdateLogicError::rule("unit 3", "bad input");
        assert_eq!(e.origin(), "unit 3");
        assert_eq!(e.to_string(), "unit 3: bad input");
        let moved = e.with_origin("unit 5");
        assert_eq!(moved, UpdateLogicError::rule("unit 5", "bad input"));
    }

    #[test]
    fn coupling_removed_display() {
        let e = CouplingError::ComponentRemoved {
            coupling: CouplingId(1),
            component: ComponentId(4),
        };
        assert_eq!(
            e.to_string(),
            "coupling 1 references removed component 4"
        );
    }
}
