//! Directed weighted edges between units.

use neurite_core::{catch_panic, ConnectionId, StepId, UnitId, UpdateLogicError};

/// Inputs handed to a [`ConnectionRule`] for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectionContext {
    /// The connection being updated.
    pub id: ConnectionId,
    /// Source unit value visible to this update.
    pub source_value: f64,
    /// Target unit value visible to this update.
    pub target_value: f64,
    /// Committed strength.
    pub strength: f64,
    /// The step being computed.
    pub step: StepId,
}

/// Computes a connection's next strength.
pub trait ConnectionRule: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Compute the next strength.
    fn update(&mut self, ctx: &ConnectionContext) -> Result<f64, UpdateLogicError>;
}

/// Keeps the strength fixed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StaticStrength;

impl ConnectionRule for StaticStrength {
    fn name(&self) -> &str {
        "static"
    }

    fn update(&mut self, ctx: &ConnectionContext) -> Result<f64, UpdateLogicError> {
        Ok(ctx.strength)
    }
}

/// Plain Hebbian learning, `w += rate * source * target`, bounded to
/// `[-bound, bound]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HebbianRule {
    /// Learning rate.
    pub rate: f64,
    /// Absolute strength limit.
    pub bound: f64,
}

impl Default for HebbianRule {
    fn default() -> Self {
        Self {
            rate: 0.1,
            bound: 10.0,
        }
    }
}

impl ConnectionRule for HebbianRule {
    fn name(&self) -> &str {
        "hebbian"
    }

    fn update(&mut self, ctx: &ConnectionContext) -> Result<f64, UpdateLogicError> {
        let next = ctx.strength + self.rate * ctx.source_value * ctx.target_value;
        Ok(next.clamp(-self.bound, self.bound))
    }
}

/// A directed edge from `source` to `target`.
///
/// The endpoints are indices into the owning network, not owning
/// references; a connection never outlives its network.
pub struct Connection {
    id: ConnectionId,
    source: UnitId,
    target: UnitId,
    strength: f64,
    buffer: f64,
    rule: Box<dyn ConnectionRule>,
}

impl Connection {
    /// A connection with the given endpoints and strength.
    pub fn new(
        id: ConnectionId,
        source: UnitId,
        target: UnitId,
        strength: f64,
        rule: Box<dyn ConnectionRule>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            strength,
            buffer: strength,
            rule,
        }
    }

    /// This connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Presynaptic unit.
    pub fn source(&self) -> UnitId {
        self.source
    }

    /// Postsynaptic unit.
    pub fn target(&self) -> UnitId {
        self.target
    }

    /// Committed strength.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Force the committed strength.
    pub fn set_strength(&mut self, strength: f64) {
        self.strength = strength;
        self.buffer = strength;
    }

    /// Name of the installed rule.
    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    /// Compute the pending strength. On error the pending strength is
    /// reset to the committed one.
    pub fn update(
        &mut self,
        source_value: f64,
        target_value: f64,
        step: StepId,
    ) -> Result<(), UpdateLogicError> {
        let ctx = ConnectionContext {
            id: self.id,
            source_value,
            target_value,
            strength: self.strength,
            step,
        };
        let rule = &mut self.rule;
        let result = catch_panic("connection", || rule.update(&ctx))
            .map_err(|e| e.with_origin(format!("connection {}", self.id)));
        match result {
            Ok(next) if next.is_finite() => {
                self.buffer = next;
                Ok(())
            }
            Ok(next) => {
                self.buffer = self.strength;
                Err(UpdateLogicError::NonFinite {
                    origin: format!("connection {}", self.id),
                    value: next,
                })
            }
            Err(e) => {
                self.buffer = self.strength;
                Err(e)
            }
        }
    }

    /// Copy the pending strength into the committed strength.
    pub fn commit(&mut self) {
        self.strength = self.buffer;
    }

    /// Drop the pending strength.
    pub fn discard(&mut self) {
        self.buffer = self.strength;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("strength", &self.strength)
            .field("rule", &self.rule.name())
            .finish()
    }
}
