//! Sequential update in priority order.

use neurite_core::{NetworkInstanceId, PoolError, UnitId};

use crate::action::{ActionSpec, UpdateAction};
use crate::state::NetworkCore;

/// Updates units one at a time, lowest priority number first, committing
/// each before the next runs. A unit therefore sees same-step values of
/// every unit ordered before it. Each unit's incoming connections update
/// and commit right after the unit.
///
/// The sort is stable (ties keep insertion order) and is cached until
/// the network's revision changes. The cache is keyed on the network
/// instance too, so an action moved to another network re-sorts.
#[derive(Debug, Default)]
pub struct PriorityUpdate {
    order: Vec<UnitId>,
    cached_for: Option<(NetworkInstanceId, u64)>,
}

impl PriorityUpdate {
    /// A priority update with an empty order cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh(&mut self, net: &NetworkCore) {
        let key = (net.instance(), net.revision());
        if self.cached_for != Some(key) {
            self.order = net.priority_order();
            self.cached_for = Some(key);
            log::trace!("priority order rebuilt for revision {}", net.revision());
        }
    }
}

impl UpdateAction for PriorityUpdate {
    fn description(&self) -> &str {
        "Priority Update"
    }

    fn long_description(&self) -> String {
        "Priority Update (units in ascending priority order)".to_string()
    }

    fn spec(&self) -> Option<ActionSpec> {
        Some(ActionSpec::Priority)
    }

    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        self.refresh(net);
        let step = net.step();
        let slots = net.slots();
        let read = |j: usize| slots.value(j);
        for id in &self.order {
            let i = id.index();
            slots.update_unit(i, step, &read);
            slots.commit_unit(i);
            slots.update_incoming(i, step, &read);
            slots.commit_incoming(i);
        }
        Ok(())
    }
}
