//! Unit and connection storage shared between a network and its passes.
//!
//! Units and connections each sit behind their own mutex so that chunk
//! tasks on a worker pool can update disjoint units concurrently. The
//! slot table itself is behind an `Arc`: a pass clones the `Arc` into
//! its tasks, and structural edits go through `Arc::make_mut`, which
//! only copies the (cheap) handle vectors if a straggling task still
//! holds the old table.
//!
//! Every helper takes at most one element lock at a time.

use std::sync::{Arc, Mutex};

use neurite_core::{lock_recover, ConnectionId, NetworkInstanceId, StepId, UnitId};
use smallvec::SmallVec;

use crate::connection::{Connection, ConnectionRule};
use crate::error::NetworkError;
use crate::unit::{Unit, UnitRule};

/// Incoming connections of one unit, in creation order.
pub type FanIn = SmallVec<[ConnectionId; 8]>;

#[derive(Clone, Default)]
pub(crate) struct Slots {
    units: Vec<Arc<Mutex<Unit>>>,
    connections: Vec<Arc<Mutex<Connection>>>,
    fan_in: Vec<FanIn>,
}

impl Slots {
    pub(crate) fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn value(&self, index: usize) -> f64 {
        lock_recover(&self.units[index]).value()
    }

    /// Committed values of every unit, in id order.
    pub(crate) fn snapshot(&self) -> Arc<[f64]> {
        self.units.iter().map(|u| lock_recover(u).value()).collect()
    }

    /// Weighted connection sum into unit `index`, summed in fan-in order.
    pub(crate) fn net_input(&self, index: usize, read: &dyn Fn(usize) -> f64) -> f64 {
        self.fan_in[index]
            .iter()
            .map(|c| {
                let (strength, source) = {
                    let conn = lock_recover(&self.connections[c.index()]);
                    (conn.strength(), conn.source())
                };
                strength * read(source.index())
            })
            .sum()
    }

    /// Fill unit `index`'s pending buffer. Returns the number of
    /// contained failures.
    pub(crate) fn update_unit(
        &self,
        index: usize,
        step: StepId,
        read: &dyn Fn(usize) -> f64,
    ) -> usize {
        let net_input = self.net_input(index, read);
        let mut unit = lock_recover(&self.units[index]);
        match unit.update(net_input, step) {
            Ok(()) => 0,
            Err(e) => {
                log::warn!("{e}; keeping previous value");
                1
            }
        }
    }

    /// Fill the pending strength of every connection into unit `index`.
    pub(crate) fn update_incoming(
        &self,
        index: usize,
        step: StepId,
        read: &dyn Fn(usize) -> f64,
    ) -> usize {
        let target_value = read(index);
        let mut failures = 0;
        for c in &self.fan_in[index] {
            let source = lock_recover(&self.connections[c.index()]).source();
            let source_value = read(source.index());
            let mut conn = lock_recover(&self.connections[c.index()]);
            if let Err(e) = conn.update(source_value, target_value, step) {
                log::warn!("{e}; keeping previous strength");
                failures += 1;
            }
        }
        failures
    }

    pub(crate) fn commit_unit(&self, index: usize) {
        lock_recover(&self.units[index]).commit();
    }

    pub(crate) fn commit_incoming(&self, index: usize) {
        for c in &self.fan_in[index] {
            lock_recover(&self.connections[c.index()]).commit();
        }
    }

    pub(crate) fn commit_all(&self) {
        for u in &self.units {
            lock_recover(u).commit();
        }
        for c in &self.connections {
            lock_recover(c).commit();
        }
    }

    pub(crate) fn discard_all(&self) {
        for u in &self.units {
            lock_recover(u).discard();
        }
        for c in &self.connections {
            lock_recover(c).discard();
        }
    }
}

/// The state an update action operates on: units, connections, fan-in
/// adjacency, and the step counter.
pub struct NetworkCore {
    instance: NetworkInstanceId,
    slots: Arc<Slots>,
    step: StepId,
    revision: u64,
}

impl Default for NetworkCore {
    fn default() -> Self {
        Self {
            instance: NetworkInstanceId::next(),
            slots: Arc::default(),
            step: StepId::default(),
            revision: 0,
        }
    }
}

impl NetworkCore {
    /// An empty network core.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifies this core among all live and past cores.
    pub fn instance(&self) -> NetworkInstanceId {
        self.instance
    }

    pub(crate) fn slots(&self) -> &Arc<Slots> {
        &self.slots
    }

    /// Append a unit and return its id.
    pub fn add_unit(&mut self, rule: Box<dyn UnitRule>) -> Result<UnitId, NetworkError> {
        let index =
            u32::try_from(self.slots.units.len()).map_err(|_| NetworkError::CapacityExceeded)?;
        let id = UnitId(index);
        let slots = Arc::make_mut(&mut self.slots);
        slots.units.push(Arc::new(Mutex::new(Unit::new(id, rule))));
        slots.fan_in.push(FanIn::new());
        self.revision += 1;
        Ok(id)
    }

    /// Append a connection from `source` to `target`.
    pub fn add_connection(
        &mut self,
        source: UnitId,
        target: UnitId,
        strength: f64,
        rule: Box<dyn ConnectionRule>,
    ) -> Result<ConnectionId, NetworkError> {
        for unit in [source, target] {
            if unit.index() >= self.slots.units.len() {
                return Err(NetworkError::UnknownUnit { unit });
            }
        }
        let index = u32::try_from(self.slots.connections.len())
            .map_err(|_| NetworkError::CapacityExceeded)?;
        let id = ConnectionId(index);
        let slots = Arc::make_mut(&mut self.slots);
        slots.connections.push(Arc::new(Mutex::new(Connection::new(
            id, source, target, strength, rule,
        ))));
        slots.fan_in[target.index()].push(id);
        self.revision += 1;
        Ok(id)
    }

    /// Number of units.
    pub fn unit_count(&self) -> usize {
        self.slots.units.len()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.slots.connections.len()
    }

    /// The step most recently started. `StepId(0)` before the first update.
    pub fn step(&self) -> StepId {
        self.step
    }

    pub(crate) fn advance_step(&mut self) -> StepId {
        self.step = self.step.next();
        self.step
    }

    /// Bumped on every structural or priority change. Counts from zero in
    /// every core; pair it with [`instance`](Self::instance) when caching.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Committed value of a unit.
    pub fn value(&self, id: UnitId) -> Option<f64> {
        self.slots
            .units
            .get(id.index())
            .map(|u| lock_recover(u).value())
    }

    /// Committed values of every unit, in id order.
    pub fn values(&self) -> Vec<f64> {
        self.slots.snapshot().to_vec()
    }

    /// Committed strength of a connection.
    pub fn strength(&self, id: ConnectionId) -> Option<f64> {
        self.slots
            .connections
            .get(id.index())
            .map(|c| lock_recover(c).strength())
    }

    /// Incoming connections of a unit.
    pub fn fan_in(&self, id: UnitId) -> &[ConnectionId] {
        self.slots
            .fan_in
            .get(id.index())
            .map(|f| f.as_slice())
            .unwrap_or(&[])
    }

    /// Weighted sum of committed source values into `id`. Excludes the
    /// unit's external input.
    pub fn net_input(&self, id: UnitId) -> Option<f64> {
        if id.index() >= self.unit_count() {
            return None;
        }
        Some(self.slots.net_input(id.index(), &|j| self.slots.value(j)))
    }

    /// Read a unit.
    pub fn with_unit<R>(&self, id: UnitId, f: impl FnOnce(&Unit) -> R) -> Option<R> {
        self.slots.units.get(id.index()).map(|u| f(&lock_recover(u)))
    }

    /// Mutate a unit. Counts as a revision, since the priority may change.
    pub fn with_unit_mut<R>(&mut self, id: UnitId, f: impl FnOnce(&mut Unit) -> R) -> Option<R> {
        let unit = self.slots.units.get(id.index())?;
        let out = f(&mut lock_recover(unit));
        self.revision += 1;
        Some(out)
    }

    /// Read a connection.
    pub fn with_connection<R>(
        &self,
        id: ConnectionId,
        f: impl FnOnce(&Connection) -> R,
    ) -> Option<R> {
        self.slots
            .connections
            .get(id.index())
            .map(|c| f(&lock_recover(c)))
    }

    /// Force a unit's committed value. Clamped units are overwritten too.
    /// Not a revision change.
    pub fn set_value(&mut self, id: UnitId, value: f64) -> Result<(), NetworkError> {
        self.slots
            .units
            .get(id.index())
            .map(|u| lock_recover(u).set_value(value))
            .ok_or(NetworkError::UnknownUnit { unit: id })
    }

    /// Add external input to a unit for its next update.
    pub fn add_input(&mut self, id: UnitId, amount: f64) -> Result<(), NetworkError> {
        self.slots
            .units
            .get(id.index())
            .map(|u| lock_recover(u).add_input(amount))
            .ok_or(NetworkError::UnknownUnit { unit: id })
    }

    /// Unit ids sorted ascending by priority, ties in insertion order.
    pub fn priority_order(&self) -> Vec<UnitId> {
        let mut keyed: Vec<(i32, UnitId)> = self
            .slots
            .units
            .iter()
            .map(|u| {
                let u = lock_recover(u);
                (u.priority(), u.id())
            })
            .collect();
        keyed.sort_by_key(|(p, _)| *p);
        keyed.into_iter().map(|(_, id)| id).collect()
    }
}

impl std::fmt::Debug for NetworkCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkCore")
            .field("instance", &self.instance)
            .field("units", &self.unit_count())
            .field("connections", &self.connection_count())
            .field("step", &self.step)
            .field("revision", &self.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StaticStrength;
    use crate::unit::LinearRule;

    fn identity() -> Box<dyn UnitRule> {
        Box::new(LinearRule::identity())
    }

    #[test]
    fn connect_rejects_unknown_units() {
        let mut core = NetworkCore::new();
        let a = core.add_unit(identity()).unwrap();
        let err = core
            .add_connection(a, UnitId(9), 1.0, Box::new(StaticStrength))
            .unwrap_err();
        assert_eq!(err, NetworkError::UnknownUnit { unit: UnitId(9) });
    }

    #[test]
    fn fan_in_tracks_targets() {
        let mut core = NetworkCore::new();
        let a = core.add_unit(identity()).unwrap();
        let b = core.add_unit(identity()).unwrap();
        let c0 = core.add_connection(a, b, 0.5, Box::new(StaticStrength)).unwrap();
        let c1 = core.add_connection(b, b, 0.25, Box::new(StaticStrength)).unwrap();
        assert_eq!(core.fan_in(b), &[c0, c1]);
        assert!(core.fan_in(a).is_empty());
        core.set_value(a, 2.0).unwrap();
        core.set_value(b, 4.0).unwrap();
        assert_eq!(core.net_input(b), Some(2.0));
    }

    #[test]
    fn priority_order_is_stable() {
        let mut core = NetworkCore::new();
        let ids: Vec<UnitId> = (0..4).map(|_| core.add_unit(identity()).unwrap()).collect();
        core.with_unit_mut(ids[0], |u| u.set_priority(2));
        core.with_unit_mut(ids[1], |u| u.set_priority(1));
        core.with_unit_mut(ids[2], |u| u.set_priority(2));
        core.with_unit_mut(ids[3], |u| u.set_priority(1));
        assert_eq!(
            core.priority_order(),
            vec![ids[1], ids[3], ids[0], ids[2]]
        );
    }

    #[test]
    fn structural_edit_while_table_is_shared() {
        let mut core = NetworkCore::new();
        let a = core.add_unit(identity()).unwrap();
        let held = Arc::clone(core.slots());
        core.add_unit(identity()).unwrap();
        assert_eq!(held.unit_count(), 1);
        assert_eq!(core.unit_count(), 2);
        core.set_value(a, 1.5).unwrap();
        // Element state is shared; only the table was copied.
        assert_eq!(held.value(0), 1.5);
    }
}
