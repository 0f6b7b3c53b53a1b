//! A network: units, connections, and the actions that update them.

use neurite_core::{ConnectionId, PoolError, StepId, UnitId};

use crate::action::UpdateAction;
use crate::buffered::BufferedUpdate;
use crate::connection::{ConnectionRule, StaticStrength};
use crate::error::NetworkError;
use crate::manager::UpdateManager;
use crate::state::NetworkCore;
use crate::unit::UnitRule;

/// Owns a [`NetworkCore`] and the [`UpdateManager`] that advances it.
///
/// A new network updates with an inline [`BufferedUpdate`]; replace or
/// extend the action list through [`manager_mut`](Self::manager_mut).
pub struct Network {
    label: String,
    core: NetworkCore,
    manager: UpdateManager,
}

impl Network {
    /// An empty network with the default buffered action.
    pub fn new(label: impl Into<String>) -> Self {
        let mut manager = UpdateManager::new();
        manager.add(Box::new(BufferedUpdate::inline()));
        Self::with_manager(label, manager)
    }

    /// An empty network with the given action list.
    pub fn with_manager(label: impl Into<String>, manager: UpdateManager) -> Self {
        Self {
            label: label.into(),
            core: NetworkCore::new(),
            manager,
        }
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unit and connection state.
    pub fn core(&self) -> &NetworkCore {
        &self.core
    }

    /// Mutable unit and connection state.
    pub fn core_mut(&mut self) -> &mut NetworkCore {
        &mut self.core
    }

    /// The action list.
    pub fn manager(&self) -> &UpdateManager {
        &self.manager
    }

    /// Mutable action list.
    pub fn manager_mut(&mut self) -> &mut UpdateManager {
        &mut self.manager
    }

    /// Replace the action list with a single action.
    pub fn set_action(&mut self, action: Box<dyn UpdateAction>) {
        self.manager.clear();
        self.manager.add(action);
    }

    /// Append a unit driven by `rule`.
    pub fn add_unit(&mut self, rule: impl UnitRule) -> Result<UnitId, NetworkError> {
        self.core.add_unit(Box::new(rule))
    }

    /// Connect `source` to `target` with a fixed strength.
    pub fn connect(
        &mut self,
        source: UnitId,
        target: UnitId,
        strength: f64,
    ) -> Result<ConnectionId, NetworkError> {
        self.core
            .add_connection(source, target, strength, Box::new(StaticStrength))
    }

    /// Connect `source` to `target` with a learning rule.
    pub fn add_connection(
        &mut self,
        source: UnitId,
        target: UnitId,
        strength: f64,
        rule: impl ConnectionRule,
    ) -> Result<ConnectionId, NetworkError> {
        self.core
            .add_connection(source, target, strength, Box::new(rule))
    }

    /// Committed value of a unit.
    pub fn value(&self, id: UnitId) -> Option<f64> {
        self.core.value(id)
    }

    /// Committed values of every unit.
    pub fn values(&self) -> Vec<f64> {
        self.core.values()
    }

    /// Force a unit's value.
    pub fn set_value(&mut self, id: UnitId, value: f64) -> Result<(), NetworkError> {
        self.core.set_value(id, value)
    }

    /// Clamp or release a unit.
    pub fn set_clamped(&mut self, id: UnitId, clamped: bool) -> Result<(), NetworkError> {
        self.core
            .with_unit_mut(id, |u| u.set_clamped(clamped))
            .ok_or(NetworkError::UnknownUnit { unit: id })
    }

    /// Set a unit's update priority.
    pub fn set_priority(&mut self, id: UnitId, priority: i32) -> Result<(), NetworkError> {
        self.core
            .with_unit_mut(id, |u| u.set_priority(priority))
            .ok_or(NetworkError::UnknownUnit { unit: id })
    }

    /// Add external input to a unit for its next update.
    pub fn add_input(&mut self, id: UnitId, amount: f64) -> Result<(), NetworkError> {
        self.core.add_input(id, amount)
    }

    /// Number of units.
    pub fn unit_count(&self) -> usize {
        self.core.unit_count()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.core.connection_count()
    }

    /// The last step started.
    pub fn step(&self) -> StepId {
        self.core.step()
    }

    /// Advance one step: bump the counter, then run every action.
    ///
    /// Returns the step that ran. An error means some action could not
    /// finish its pass; the other actions still ran.
    pub fn update(&mut self) -> Result<StepId, PoolError> {
        let step = self.core.advance_step();
        log::trace!("network '{}' step {step}", self.label);
        self.manager.invoke_all(&mut self.core).map(|()| step)
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("label", &self.label)
            .field("core", &self.core)
            .field("manager", &self.manager)
            .finish()
    }
}
