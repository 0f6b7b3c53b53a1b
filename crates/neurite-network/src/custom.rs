//! Late-bound update logic resolved by name at load time.

use indexmap::IndexMap;
use neurite_core::{PoolError, ScriptResolutionError};

use crate::action::{ActionSpec, UpdateAction};
use crate::state::NetworkCore;

/// Turns a script reference into a runnable action.
pub trait ScriptResolver {
    /// Resolve `script`, or explain why it cannot be run.
    fn resolve(&self, script: &str) -> Result<Box<dyn UpdateAction>, ScriptResolutionError>;
}

type Factory = Box<dyn Fn() -> Result<Box<dyn UpdateAction>, String> + Send + Sync>;

/// A [`ScriptResolver`] backed by named factories.
#[derive(Default)]
pub struct ScriptRegistry {
    factories: IndexMap<String, Factory>,
}

impl ScriptRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible factory under `name`, replacing any
    /// previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn UpdateAction> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Box::new(move || Ok(factory())));
    }

    /// Register a factory that may refuse to build, e.g. because its
    /// parameters are invalid.
    pub fn register_checked<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn UpdateAction>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl ScriptResolver for ScriptRegistry {
    fn resolve(&self, script: &str) -> Result<Box<dyn UpdateAction>, ScriptResolutionError> {
        let factory = self
            .factories
            .get(script)
            .ok_or_else(|| ScriptResolutionError::NotFound {
                script: script.to_string(),
            })?;
        factory().map_err(|reason| ScriptResolutionError::Rejected {
            script: script.to_string(),
            reason,
        })
    }
}

/// Resolution state of a [`CustomUpdate`].
pub enum CustomState {
    /// The script resolved; invocations delegate to it.
    Resolved(Box<dyn UpdateAction>),
    /// The script failed to resolve; invocations do nothing.
    Unresolved(ScriptResolutionError),
}

/// An update action whose logic is supplied by name.
pub struct CustomUpdate {
    script: String,
    description: String,
    state: CustomState,
}

impl CustomUpdate {
    /// Resolve `script` now, failing if it cannot be resolved.
    pub fn resolve(
        script: impl Into<String>,
        resolver: &dyn ScriptResolver,
    ) -> Result<Self, ScriptResolutionError> {
        let script = script.into();
        let action = resolver.resolve(&script)?;
        Ok(Self {
            description: format!("Custom Update: {script}"),
            script,
            state: CustomState::Resolved(action),
        })
    }

    /// Resolve `script`, degrading to a no-op on failure. The failure is
    /// logged here, once; later invocations are silent.
    pub fn load(script: impl Into<String>, resolver: &dyn ScriptResolver) -> Self {
        let script = script.into();
        match Self::resolve(script.as_str(), resolver) {
            Ok(action) => action,
            Err(e) => {
                log::warn!("{e}; custom update will do nothing");
                Self {
                    description: format!("Custom Update: {script} (unresolved)"),
                    script,
                    state: CustomState::Unresolved(e),
                }
            }
        }
    }

    /// The script reference.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Current resolution state.
    pub fn state(&self) -> &CustomState {
        &self.state
    }

    /// Whether the script resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, CustomState::Resolved(_))
    }

    /// The resolution failure, if any.
    pub fn failure(&self) -> Option<&ScriptResolutionError> {
        match &self.state {
            CustomState::Unresolved(e) => Some(e),
            CustomState::Resolved(_) => None,
        }
    }
}

impl UpdateAction for CustomUpdate {
    fn description(&self) -> &str {
        &self.description
    }

    fn long_description(&self) -> String {
        match &self.state {
            CustomState::Resolved(action) => action.long_description(),
            CustomState::Unresolved(e) => format!("{}: {e}", self.description),
        }
    }

    fn spec(&self) -> Option<ActionSpec> {
        Some(ActionSpec::Custom {
            script: self.script.clone(),
        })
    }

    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        match &mut self.state {
            CustomState::Resolved(action) => action.invoke(net),
            CustomState::Unresolved(_) => Ok(()),
        }
    }
}
