//! Ordered list of update actions run once per network step.

use std::sync::Arc;

use neurite_core::PoolError;
use neurite_pool::WorkerPool;

use crate::action::{ActionSpec, UpdateAction};
use crate::buffered::BufferedUpdate;
use crate::custom::{CustomUpdate, ScriptResolver};
use crate::priority::PriorityUpdate;
use crate::state::NetworkCore;

/// Runs its actions once each, in list order, on every step.
///
/// A failing action does not stop the step: the rest still run, and the
/// first failure is returned once all have had their turn.
#[derive(Default)]
pub struct UpdateManager {
    actions: Vec<Box<dyn UpdateAction>>,
}

impl UpdateManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from persisted specs.
    ///
    /// Buffered actions fan out on `pool` when one is given. Custom
    /// actions are resolved through `resolver`; an unresolvable script
    /// becomes a no-op, reported once. Group actions are rebuilt by
    /// resolving their label; a label the resolver cannot build is
    /// skipped with a warning.
    pub fn from_specs(
        specs: &[ActionSpec],
        pool: Option<&Arc<WorkerPool>>,
        resolver: &dyn ScriptResolver,
    ) -> Self {
        let mut manager = Self::new();
        for spec in specs {
            let action: Box<dyn UpdateAction> = match spec {
                ActionSpec::Buffered { chunk_size } => {
                    let buffered = match pool {
                        Some(pool) => BufferedUpdate::parallel(Arc::clone(pool)),
                        None => BufferedUpdate::inline(),
                    };
                    Box::new(buffered.with_chunk_size(*chunk_size))
                }
                ActionSpec::Priority => Box::new(PriorityUpdate::new()),
                ActionSpec::Group { label } => match resolver.resolve(label) {
                    Ok(action) => action,
                    Err(e) => {
                        log::warn!("{e}; group update {label} skipped");
                        continue;
                    }
                },
                ActionSpec::Custom { script } => {
                    Box::new(CustomUpdate::load(script.as_str(), resolver))
                }
            };
            manager.add(action);
        }
        manager
    }

    /// Persistable specs of every action that has one.
    pub fn specs(&self) -> Vec<ActionSpec> {
        self.actions.iter().filter_map(|a| a.spec()).collect()
    }

    /// Append an action.
    pub fn add(&mut self, action: Box<dyn UpdateAction>) {
        self.actions.push(action);
    }

    /// Insert an action at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, action: Box<dyn UpdateAction>) {
        let index = index.min(self.actions.len());
        self.actions.insert(index, action);
    }

    /// Remove and return the action at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn UpdateAction>> {
        (index < self.actions.len()).then(|| self.actions.remove(index))
    }

    /// Move the action at `from` so that it ends up at `to`. Returns
    /// `false` if either index is out of range.
    pub fn move_action(&mut self, from: usize, to: usize) -> bool {
        let len = self.actions.len();
        if from >= len || to >= len {
            return false;
        }
        let action = self.actions.remove(from);
        self.actions.insert(to, action);
        true
    }

    /// Remove every action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Short descriptions, in list order.
    pub fn descriptions(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.description()).collect()
    }

    /// Long descriptions, in list order.
    pub fn long_descriptions(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.long_description()).collect()
    }

    /// Invoke every action once, in order.
    pub fn invoke_all(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        let mut first_error = None;
        for action in &mut self.actions {
            log::trace!("step {}: {}", net.step(), action.description());
            if let Err(e) = action.invoke(net) {
                log::warn!("step {}: {} incomplete: {e}", net.step(), action.description());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for UpdateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptions()).finish()
    }
}
