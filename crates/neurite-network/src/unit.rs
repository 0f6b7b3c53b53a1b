//! Units and the rule contract that drives them.

use neurite_core::{catch_panic, StepId, UnitId, UpdateLogicError};

/// Inputs handed to a [`UnitRule`] for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitContext {
    /// The unit being updated.
    pub id: UnitId,
    /// The unit's committed value.
    pub value: f64,
    /// Weighted sum over incoming connections plus external input.
    pub net_input: f64,
    /// The step being computed.
    pub step: StepId,
}

/// Computes a unit's next value.
///
/// Rules are opaque to the engine. A rule sees only the [`UnitContext`]
/// and returns the value to place in the unit's pending buffer. Errors
/// and panics are contained: the unit keeps its committed value for the
/// step.
pub trait UnitRule: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Compute the next value.
    fn update(&mut self, ctx: &UnitContext) -> Result<f64, UpdateLogicError>;
}

/// `slope * net_input + bias`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearRule {
    /// Gain applied to the net input.
    pub slope: f64,
    /// Constant offset.
    pub bias: f64,
}

impl LinearRule {
    /// The identity activation: the unit takes its net input.
    pub fn identity() -> Self {
        Self {
            slope: 1.0,
            bias: 0.0,
        }
    }
}

impl Default for LinearRule {
    fn default() -> Self {
        Self::identity()
    }
}

impl UnitRule for LinearRule {
    fn name(&self) -> &str {
        "linear"
    }

    fn update(&mut self, ctx: &UnitContext) -> Result<f64, UpdateLogicError> {
        Ok(self.slope * ctx.net_input + self.bias)
    }
}

/// A rule backed by a closure.
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F>
where
    F: FnMut(&UnitContext) -> Result<f64, UpdateLogicError> + Send + 'static,
{
    /// Wrap `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> UnitRule for FnRule<F>
where
    F: FnMut(&UnitContext) -> Result<f64, UpdateLogicError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, ctx: &UnitContext) -> Result<f64, UpdateLogicError> {
        (self.f)(ctx)
    }
}

/// A stateful numeric element owned by one network.
pub struct Unit {
    id: UnitId,
    label: String,
    value: f64,
    buffer: f64,
    input: f64,
    priority: i32,
    clamped: bool,
    rule: Box<dyn UnitRule>,
}

impl Unit {
    /// A unit at value zero, priority zero, not clamped.
    pub fn new(id: UnitId, rule: Box<dyn UnitRule>) -> Self {
        Self {
            id,
            label: format!("unit {id}"),
            value: 0.0,
            buffer: 0.0,
            input: 0.0,
            priority: 0,
            clamped: false,
            rule,
        }
    }

    /// This unit's id.
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the display label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Committed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Pending value for the step in progress.
    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    /// Force the committed value. The pending buffer follows.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.buffer = value;
    }

    /// External input accumulated since the last commit.
    pub fn input(&self) -> f64 {
        self.input
    }

    /// Add to the external input for the next update.
    pub fn add_input(&mut self, amount: f64) {
        self.input += amount;
    }

    /// Update priority; lower runs first under priority ordering.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Set the update priority.
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Whether updates leave the value untouched.
    pub fn is_clamped(&self) -> bool {
        self.clamped
    }

    /// Clamp or release the unit.
    pub fn set_clamped(&mut self, clamped: bool) {
        self.clamped = clamped;
    }

    /// Name of the installed rule.
    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    /// Replace the rule.
    pub fn set_rule(&mut self, rule: Box<dyn UnitRule>) {
        self.rule = rule;
    }

    /// Compute the pending buffer from the committed state.
    ///
    /// `net_input` is the weighted connection sum; the unit's own
    /// external input is added here. On error the buffer is reset to the
    /// committed value so the commit leaves the unit unchanged.
    pub fn update(&mut self, net_input: f64, step: StepId) -> Result<(), UpdateLogicError> {
        if self.clamped {
            self.buffer = self.value;
            return Ok(());
        }
        let ctx = UnitContext {
            id: self.id,
            value: self.value,
            net_input: net_input + self.input,
            step,
        };
        let rule = &mut self.rule;
        let result = catch_panic("unit", || rule.update(&ctx))
            .map_err(|e| e.with_origin(format!("unit {}", self.id)))
            .and_then(|next| {
                if next.is_finite() {
                    Ok(next)
                } else {
                    Err(UpdateLogicError::NonFinite {
                        origin: format!("unit {}", self.id),
                        value: next,
                    })
                }
            });
        match result {
            Ok(next) => {
                self.buffer = next;
                Ok(())
            }
            Err(e) => {
                self.buffer = self.value;
                Err(e)
            }
        }
    }

    /// Copy the pending buffer into the value and clear external input.
    pub fn commit(&mut self) {
        if !self.clamped {
            self.value = self.buffer;
        }
        self.input = 0.0;
    }

    /// Drop the pending buffer; external input is kept for the next step.
    pub fn discard(&mut self) {
        self.buffer = self.value;
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("buffer", &self.buffer)
            .field("priority", &self.priority)
            .field("clamped", &self.clamped)
            .field("rule", &self.rule.name())
            .finish()
    }
}
