//! The registry of components and the couplings between them.

use std::sync::Arc;

use indexmap::IndexMap;
use neurite_core::{ComponentId, CouplingError, CouplingId};

use crate::component::Component;
use crate::coupling::{AttributeRef, Coupling, CouplingUpdate};

/// Components and couplings, both in insertion order.
///
/// The workspace holds the only strong references to its components.
/// Couplings hold weak ones, so removing a component invalidates every
/// coupling that touches it. Ids are never reused.
#[derive(Default)]
pub struct Workspace {
    components: IndexMap<ComponentId, Arc<dyn Component>>,
    couplings: IndexMap<CouplingId, Arc<CouplingUpdate>>,
    next_component: u32,
    next_coupling: u32,
}

impl Workspace {
    /// An empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component.
    pub fn add_component(&mut self, component: Arc<dyn Component>) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        log::debug!("workspace: added component {id} ({})", component.name());
        self.components.insert(id, component);
        id
    }

    /// Remove a component and every coupling that touches it.
    pub fn remove_component(&mut self, id: ComponentId) -> Option<Arc<dyn Component>> {
        let removed = self.components.shift_remove(&id)?;
        self.couplings.retain(|_, c| {
            let keep = !c.coupling().touches(id);
            if !keep {
                log::warn!("{}: component {id} removed, coupling dropped", c.coupling());
            }
            keep
        });
        Some(removed)
    }

    /// Look up a component.
    pub fn component(&self, id: ComponentId) -> Option<&Arc<dyn Component>> {
        self.components.get(&id)
    }

    /// Registered components in insertion order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Arc<dyn Component>)> {
        self.components.iter().map(|(id, c)| (*id, c))
    }

    /// Number of registered components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Couple `producer` to `consumer`.
    ///
    /// Both components must be registered and both attributes must exist
    /// on them.
    pub fn add_coupling(
        &mut self,
        producer: AttributeRef,
        consumer: AttributeRef,
    ) -> Result<CouplingId, CouplingError> {
        let source = self.resolve(&producer)?;
        let sink = self.resolve(&consumer)?;
        let id = CouplingId(self.next_coupling);
        self.next_coupling += 1;
        let coupling = Coupling {
            id,
            producer,
            consumer,
        };
        log::debug!("workspace: added {coupling}");
        let update = CouplingUpdate::new(coupling, &source, &sink);
        self.couplings.insert(id, Arc::new(update));
        Ok(id)
    }

    /// Remove a coupling.
    pub fn remove_coupling(&mut self, id: CouplingId) -> Option<Coupling> {
        self.couplings
            .shift_remove(&id)
            .map(|c| c.coupling().clone())
    }

    /// Look up a coupling.
    pub fn coupling(&self, id: CouplingId) -> Option<&Coupling> {
        self.couplings.get(&id).map(|c| c.coupling())
    }

    /// Registered couplings in insertion order.
    pub fn couplings(&self) -> impl Iterator<Item = &Coupling> {
        self.couplings.values().map(|c| c.coupling())
    }

    /// Number of registered couplings.
    pub fn coupling_count(&self) -> usize {
        self.couplings.len()
    }

    /// Remove every component and coupling. Ids keep counting up.
    pub fn clear(&mut self) {
        self.couplings.clear();
        self.components.clear();
    }

    pub(crate) fn component_snapshot(&self) -> Vec<(ComponentId, Arc<dyn Component>)> {
        self.components
            .iter()
            .map(|(id, c)| (*id, Arc::clone(c)))
            .collect()
    }

    pub(crate) fn coupling_snapshot(&self) -> Vec<Arc<CouplingUpdate>> {
        self.couplings.values().cloned().collect()
    }

    /// Drop couplings whose endpoints have gone. Returns the dropped
    /// couplings; callers report them.
    pub(crate) fn drop_couplings(&mut self, ids: &[CouplingId]) -> Vec<Coupling> {
        ids.iter()
            .filter_map(|id| self.couplings.shift_remove(id))
            .map(|c| c.coupling().clone())
            .collect()
    }

    fn resolve(&self, attr: &AttributeRef) -> Result<Arc<dyn Component>, CouplingError> {
        let component =
            self.components
                .get(&attr.component)
                .ok_or(CouplingError::UnknownComponent {
                    component: attr.component,
                })?;
        if !component.has_attribute(&attr.attribute) {
            return Err(CouplingError::AttributeMissing {
                component: attr.component,
                attribute: attr.attribute.clone(),
            });
        }
        Ok(Arc::clone(component))
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("components", &self.components.len())
            .field("couplings", &self.couplings.len())
            .finish()
    }
}
