//! The [`UpdateAction`] trait and persisted action configuration.

use neurite_core::{catch_panic, PoolError, UpdateLogicError};

use crate::state::NetworkCore;

/// One step of update policy applied to a network.
///
/// # Contract
///
/// - `invoke()` runs once per network step, in the order the owning
///   [`UpdateManager`](crate::UpdateManager) lists its actions.
/// - Unit and connection logic errors never escape `invoke()`; they are
///   logged and the affected element keeps its value for the step.
/// - The only error an action returns is a [`PoolError`] from a worker
///   pass it could not complete. The step is then incomplete, and the
///   action leaves the network as it was before the pass.
pub trait UpdateAction: Send + 'static {
    /// Short label, e.g. `"Buffered Update"`.
    fn description(&self) -> &str;

    /// Longer human-readable explanation.
    fn long_description(&self) -> String {
        self.description().to_string()
    }

    /// Persistable configuration for this action, if it has one.
    fn spec(&self) -> Option<ActionSpec> {
        None
    }

    /// Apply one step of this policy to `net`.
    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError>;
}

/// Opaque, persistable description of an update action.
///
/// Loaded by [`UpdateManager::from_specs`](crate::UpdateManager::from_specs)
/// before the first tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSpec {
    /// [`BufferedUpdate`](crate::BufferedUpdate) with the given chunk size.
    Buffered {
        /// Units per parallel task.
        chunk_size: usize,
    },
    /// [`PriorityUpdate`](crate::PriorityUpdate).
    Priority,
    /// [`GroupUpdate`](crate::GroupUpdate) over the aggregate labelled
    /// `label`. Group members are network-specific, so the aggregate is
    /// rebuilt through the [`ScriptResolver`](crate::ScriptResolver)
    /// under its label.
    Group {
        /// Aggregate label.
        label: String,
    },
    /// [`CustomUpdate`](crate::CustomUpdate) resolved by name.
    Custom {
        /// Script reference handed to the resolver.
        script: String,
    },
}

/// An action backed by a closure. Errors and panics are logged and the
/// step continues.
pub struct ClosureAction<F> {
    description: String,
    f: F,
}

impl<F> ClosureAction<F>
where
    F: FnMut(&mut NetworkCore) -> Result<(), UpdateLogicError> + Send + 'static,
{
    /// Wrap `f` under `description`.
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

impl<F> UpdateAction for ClosureAction<F>
where
    F: FnMut(&mut NetworkCore) -> Result<(), UpdateLogicError> + Send + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        let f = &mut self.f;
        if let Err(e) = catch_panic(&self.description, || f(net)) {
            log::warn!("{}: {e}", self.description);
        }
        Ok(())
    }
}
