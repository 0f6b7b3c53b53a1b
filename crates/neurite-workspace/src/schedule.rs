//! The workspace step as an ordered, editable list of actions.
//!
//! Every tick runs the updater's [`StepActionManager`] once, in list
//! order. The default list holds a single [`BufferedStep`]: every
//! component's parts, then every coupling. Other lists give up that
//! separation for finer control, for example updating one component and
//! its outgoing couplings before the next component runs.

use neurite_core::ComponentId;

use crate::updater::StepScope;
use crate::workspace::Workspace;

/// One entry of the workspace step.
pub trait StepAction: Send + 'static {
    /// Short label, e.g. `"Update couplings"`.
    fn description(&self) -> &str;

    /// Longer human-readable explanation.
    fn long_description(&self) -> String {
        self.description().to_string()
    }

    /// Do this action's share of the current step.
    fn invoke(&mut self, scope: &mut StepScope<'_>);
}

// ── Built-in actions ─────────────────────────────────────────────

/// Every component's parts in parallel, then every coupling.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferedStep;

impl StepAction for BufferedStep {
    fn description(&self) -> &str {
        "Buffered update of all components"
    }

    fn long_description(&self) -> String {
        "Update every component in parallel, then every coupling".to_string()
    }

    fn invoke(&mut self, scope: &mut StepScope<'_>) {
        scope.update_all_components();
        scope.update_all_couplings();
    }
}

/// Every coupling, without touching components.
#[derive(Clone, Copy, Debug, Default)]
pub struct CouplingStep;

impl StepAction for CouplingStep {
    fn description(&self) -> &str {
        "Update couplings"
    }

    fn invoke(&mut self, scope: &mut StepScope<'_>) {
        scope.update_all_couplings();
    }
}

/// The parts of a single component.
#[derive(Clone, Debug)]
pub struct ComponentStep {
    component: ComponentId,
    description: String,
    reported_missing: bool,
}

impl ComponentStep {
    /// Update `component`, labelled with its `name`.
    pub fn new(component: ComponentId, name: &str) -> Self {
        Self {
            component,
            description: format!("Update {name}"),
            reported_missing: false,
        }
    }

    /// The component this step updates.
    pub fn component(&self) -> ComponentId {
        self.component
    }
}

impl StepAction for ComponentStep {
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&mut self, scope: &mut StepScope<'_>) {
        if !scope.update_component(self.component) && !self.reported_missing {
            self.reported_missing = true;
            log::warn!(
                "{}: component {} is not in the workspace",
                self.description,
                self.component
            );
        }
    }
}

/// Which couplings a [`ComponentCouplingStep`] fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouplingDirection {
    /// Couplings whose producer is the component.
    Outgoing,
    /// Couplings whose consumer is the component.
    Incoming,
}

/// The couplings leaving or entering one component.
#[derive(Clone, Debug)]
pub struct ComponentCouplingStep {
    component: ComponentId,
    direction: CouplingDirection,
    description: String,
}

impl ComponentCouplingStep {
    /// Fire `component`'s couplings in `direction`.
    pub fn new(component: ComponentId, name: &str, direction: CouplingDirection) -> Self {
        let description = match direction {
            CouplingDirection::Outgoing => format!("Update couplings from {name}"),
            CouplingDirection::Incoming => format!("Update couplings into {name}"),
        };
        Self {
            component,
            direction,
            description,
        }
    }
}

impl StepAction for ComponentCouplingStep {
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&mut self, scope: &mut StepScope<'_>) {
        match self.direction {
            CouplingDirection::Outgoing => scope.update_outgoing_couplings(self.component),
            CouplingDirection::Incoming => scope.update_incoming_couplings(self.component),
        }
    }
}

/// A step action backed by a closure.
pub struct ClosureStep<F> {
    description: String,
    f: F,
}

impl<F> ClosureStep<F>
where
    F: FnMut(&mut StepScope<'_>) + Send + 'static,
{
    /// Wrap `f` under `description`.
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

impl<F> StepAction for ClosureStep<F>
where
    F: FnMut(&mut StepScope<'_>) + Send + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&mut self, scope: &mut StepScope<'_>) {
        (self.f)(scope);
    }
}

// ── StepActionManager ────────────────────────────────────────────

/// Ordered list of [`StepAction`]s run once per workspace tick.
pub struct StepActionManager {
    actions: Vec<Box<dyn StepAction>>,
}

impl Default for StepActionManager {
    /// A single [`BufferedStep`].
    fn default() -> Self {
        Self {
            actions: vec![Box::new(BufferedStep) as Box<dyn StepAction>],
        }
    }
}

impl StepActionManager {
    /// The default list: a single [`BufferedStep`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A list with no actions. A tick over it only advances time.
    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Actions that could be added for `workspace`: the whole-workspace
    /// steps, then per-component steps in registration order.
    pub fn available(workspace: &Workspace) -> Vec<Box<dyn StepAction>> {
        let mut out: Vec<Box<dyn StepAction>> = Vec::new();
        out.push(Box::new(BufferedStep));
        out.push(Box::new(CouplingStep));
        for (id, component) in workspace.components() {
            let name = component.name();
            out.push(Box::new(ComponentStep::new(id, name)));
            out.push(Box::new(ComponentCouplingStep::new(
                id,
                name,
                CouplingDirection::Outgoing,
            )));
            out.push(Box::new(ComponentCouplingStep::new(
                id,
                name,
                CouplingDirection::Incoming,
            )));
        }
        out
    }

    /// Append an action.
    pub fn add(&mut self, action: Box<dyn StepAction>) {
        self.actions.push(action);
    }

    /// Insert an action at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, action: Box<dyn StepAction>) {
        let index = index.min(self.actions.len());
        self.actions.insert(index, action);
    }

    /// Remove and return the action at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn StepAction>> {
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

    /// Replace the list with the default [`BufferedStep`].
    pub fn restore_default(&mut self) {
        *self = Self::default();
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

    pub(crate) fn invoke_all(&mut self, scope: &mut StepScope<'_>) {
        for action in &mut self.actions {
            log::trace!("step {}: {}", scope.step(), action.description());
            action.invoke(scope);
        }
    }
}

impl std::fmt::Debug for StepActionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptions()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, UpdatePart};
    use neurite_core::{AttributeValue, CouplingError};
    use std::sync::Arc;

    struct Inert(&'static str);

    impl Component for Inert {
        fn name(&self) -> &str {
            self.0
        }

        fn update_parts(&self) -> Vec<UpdatePart> {
            Vec::new()
        }

        fn read_attribute(&self, _: &str) -> Option<AttributeValue> {
            None
        }

        fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
            Err(CouplingError::AttributeRejected {
                attribute: attribute.to_string(),
                reason: "inert".to_string(),
            })
        }
    }

    #[test]
    fn default_is_single_buffered_step() {
        let m = StepActionManager::new();
        assert_eq!(m.descriptions(), vec!["Buffered update of all components"]);
        assert_eq!(
            m.long_descriptions(),
            vec!["Update every component in parallel, then every coupling"]
        );
        assert!(StepActionManager::empty().is_empty());
    }

    #[test]
    fn list_edits_keep_order() {
        let mut m = StepActionManager::empty();
        m.add(Box::new(CouplingStep));
        m.insert(0, Box::new(ComponentStep::new(ComponentId(0), "eye")));
        m.insert(9, Box::new(ComponentStep::new(ComponentId(1), "arm")));
        assert_eq!(
            m.descriptions(),
            vec!["Update eye", "Update couplings", "Update arm"]
        );
        assert!(m.move_action(2, 0));
        assert_eq!(
            m.descriptions(),
            vec!["Update arm", "Update eye", "Update couplings"]
        );
        assert!(!m.move_action(3, 0));
        assert_eq!(
            m.remove(1).map(|a| a.description().to_string()),
            Some("Update eye".to_string())
        );
        assert!(m.remove(7).is_none());
        m.restore_default();
        assert_eq!(m.len(), 1);
        m.clear();
        assert!(m.is_empty());
    }

    #[test]
    fn available_lists_per_component_steps() {
        let mut ws = Workspace::new();
        ws.add_component(Arc::new(Inert("eye")));
        ws.add_component(Arc::new(Inert("arm")));
        let available = StepActionManager::available(&ws);
        let names: Vec<&str> = available.iter().map(|a| a.description()).collect();
        assert_eq!(
            names,
            vec![
                "Buffered update of all components",
                "Update couplings",
                "Update eye",
                "Update couplings from eye",
                "Update couplings into eye",
                "Update arm",
                "Update couplings from arm",
                "Update couplings into arm",
            ]
        );
    }
}
