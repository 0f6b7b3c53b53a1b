//! Couplings: live links from a producer attribute to a consumer attribute.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use neurite_core::{
    lock_recover, AttributeValue, ComponentId, CouplingError, CouplingId, StepId,
};

use crate::component::Component;

/// A named attribute on a registered component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    /// Owning component.
    pub component: ComponentId,
    /// Attribute name.
    pub attribute: String,
}

impl AttributeRef {
    /// Reference `attribute` on `component`.
    pub fn new(component: ComponentId, attribute: impl Into<String>) -> Self {
        Self {
            component,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.attribute)
    }
}

/// A (producer, consumer) attribute pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coupling {
    /// Workspace-assigned id.
    pub id: CouplingId,
    /// Where values are read.
    pub producer: AttributeRef,
    /// Where values are written.
    pub consumer: AttributeRef,
}

impl Coupling {
    /// Whether either endpoint belongs to `component`.
    pub fn touches(&self, component: ComponentId) -> bool {
        self.producer.component == component || self.consumer.component == component
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coupling {} ({} -> {})", self.id, self.producer, self.consumer)
    }
}

/// The schedulable copy for one [`Coupling`].
///
/// Holds only weak handles to its endpoints. Each invocation stages the
/// producer's value into a private transfer buffer, then commits the
/// buffer to the consumer, so a consumer never sees a value the producer
/// is still writing.
pub struct CouplingUpdate {
    coupling: Coupling,
    producer: Weak<dyn Component>,
    consumer: Weak<dyn Component>,
    staged: Mutex<Option<AttributeValue>>,
    last_step: AtomicU64,
}

impl CouplingUpdate {
    /// Bind `coupling` to its endpoint components.
    pub fn new(
        coupling: Coupling,
        producer: &Arc<dyn Component>,
        consumer: &Arc<dyn Component>,
    ) -> Self {
        Self {
            coupling,
            producer: Arc::downgrade(producer),
            consumer: Arc::downgrade(consumer),
            staged: Mutex::new(None),
            last_step: AtomicU64::new(0),
        }
    }

    /// The coupling this update serves.
    pub fn coupling(&self) -> &Coupling {
        &self.coupling
    }

    /// Shorthand for `coupling().id`.
    pub fn id(&self) -> CouplingId {
        self.coupling.id
    }

    /// Whether both endpoint components are still alive.
    pub fn is_valid(&self) -> bool {
        self.producer.strong_count() > 0 && self.consumer.strong_count() > 0
    }

    /// The step this coupling last fired for.
    pub fn last_step(&self) -> Option<StepId> {
        match self.last_step.load(Ordering::Acquire) {
            0 => None,
            n => Some(StepId(n)),
        }
    }

    /// The value waiting in the transfer buffer, if any.
    pub fn staged(&self) -> Option<AttributeValue> {
        lock_recover(&self.staged).clone()
    }

    /// Forget which step last fired, so the coupling fires again from
    /// step 1.
    pub fn reset(&self) {
        self.last_step.store(0, Ordering::Release);
        *lock_recover(&self.staged) = None;
    }

    /// Read the producer into the transfer buffer.
    pub fn stage(&self) -> Result<(), CouplingError> {
        let producer = self.endpoint(&self.producer, self.coupling.producer.component)?;
        let value = producer
            .read_attribute(&self.coupling.producer.attribute)
            .ok_or_else(|| CouplingError::AttributeMissing {
                component: self.coupling.producer.component,
                attribute: self.coupling.producer.attribute.clone(),
            })?;
        *lock_recover(&self.staged) = Some(value);
        Ok(())
    }

    /// Write the transfer buffer to the consumer. Does nothing if
    /// nothing is staged.
    pub fn commit(&self) -> Result<(), CouplingError> {
        let consumer = self.endpoint(&self.consumer, self.coupling.consumer.component)?;
        let Some(value) = lock_recover(&self.staged).take() else {
            return Ok(());
        };
        consumer.write_attribute(&self.coupling.consumer.attribute, &value)
    }

    /// Stage then commit, at most once per step.
    ///
    /// Returns `Ok(false)` without touching either endpoint when the
    /// coupling has already fired for `step` or a later one.
    pub fn invoke(&self, step: StepId) -> Result<bool, CouplingError> {
        let previous = self.last_step.fetch_max(step.0, Ordering::AcqRel);
        if previous >= step.0 {
            return Ok(false);
        }
        self.stage()?;
        self.commit()?;
        Ok(true)
    }

    fn endpoint(
        &self,
        handle: &Weak<dyn Component>,
        component: ComponentId,
    ) -> Result<Arc<dyn Component>, CouplingError> {
        handle.upgrade().ok_or(CouplingError::ComponentRemoved {
            coupling: self.coupling.id,
            component,
        })
    }
}

impl fmt::Debug for CouplingUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouplingUpdate")
            .field("coupling", &self.coupling)
            .field("valid", &self.is_valid())
            .field("last_step", &self.last_step())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::UpdatePart;

    struct Cell {
        value: Mutex<f64>,
    }

    impl Cell {
        fn shared(v: f64) -> Arc<dyn Component> {
            Arc::new(Self {
                value: Mutex::new(v),
            })
        }
    }

    impl Component for Cell {
        fn name(&self) -> &str {
            "cell"
        }

        fn update_parts(&self) -> Vec<UpdatePart> {
            Vec::new()
        }

        fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
            (attribute == "value").then(|| AttributeValue::Scalar(*self.value.lock().unwrap()))
        }

        fn write_attribute(
            &self,
            attribute: &str,
            value: &AttributeValue,
        ) -> Result<(), CouplingError> {
            match (attribute, value.as_scalar()) {
                ("value", Some(v)) => {
                    *self.value.lock().unwrap() = v;
                    Ok(())
                }
                _ => Err(CouplingError::AttributeRejected {
                    attribute: attribute.to_string(),
                    reason: "unknown".into(),
                }),
            }
        }
    }

    fn coupling() -> Coupling {
        Coupling {
            id: CouplingId(0),
            producer: AttributeRef::new(ComponentId(0), "value"),
            consumer: AttributeRef::new(ComponentId(1), "value"),
        }
    }

    #[test]
    fn fires_at_most_once_per_step() {
        let a = Cell::shared(2.0);
        let b = Cell::shared(0.0);
        let c = CouplingUpdate::new(coupling(), &a, &b);
        assert_eq!(c.invoke(StepId(1)), Ok(true));
        assert_eq!(b.read_attribute("value"), Some(AttributeValue::Scalar(2.0)));
        a.write_attribute("value", &AttributeValue::Scalar(5.0)).unwrap();
        assert_eq!(c.invoke(StepId(1)), Ok(false));
        assert_eq!(b.read_attribute("value"), Some(AttributeValue::Scalar(2.0)));
        assert_eq!(c.invoke(StepId(2)), Ok(true));
        assert_eq!(b.read_attribute("value"), Some(AttributeValue::Scalar(5.0)));
        assert_eq!(c.last_step(), Some(StepId(2)));
        c.reset();
        assert_eq!(c.last_step(), None);
    }

    #[test]
    fn stage_does_not_touch_consumer() {
        let a = Cell::shared(7.0);
        let b = Cell::shared(0.0);
        let c = CouplingUpdate::new(coupling(), &a, &b);
        c.stage().unwrap();
        assert_eq!(c.staged(), Some(AttributeValue::Scalar(7.0)));
        assert_eq!(b.read_attribute("value"), Some(AttributeValue::Scalar(0.0)));
        c.commit().unwrap();
        assert_eq!(c.staged(), None);
        assert_eq!(b.read_attribute("value"), Some(AttributeValue::Scalar(7.0)));
    }

    #[test]
    fn dropped_endpoint_invalidates() {
        let a = Cell::shared(1.0);
        let b = Cell::shared(0.0);
        let c = CouplingUpdate::new(coupling(), &a, &b);
        drop(b);
        assert!(!c.is_valid());
        assert_eq!(
            c.invoke(StepId(1)),
            Err(CouplingError::ComponentRemoved {
                coupling: CouplingId(0),
                component: ComponentId(1),
            })
        );
    }

    #[test]
    fn missing_attribute_is_reported() {
        let a = Cell::shared(1.0);
        let b = Cell::shared(0.0);
        let mut bad = coupling();
        bad.producer.attribute = "nope".into();
        let c = CouplingUpdate::new(bad, &a, &b);
        assert!(matches!(
            c.invoke(StepId(1)),
            Err(CouplingError::AttributeMissing { .. })
        ));
    }
}
