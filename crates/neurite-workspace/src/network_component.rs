//! A [`Network`] registered as a workspace component.

use std::sync::{Arc, Mutex};

use neurite_core::{lock_recover, AttributeValue, CouplingError, PartError, UnitId};
use neurite_network::Network;

use crate::component::{Component, PartLock, UpdatePart};

/// Coupling attributes a network exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NetworkAttribute {
    /// `unit:<id>`: reads the value; writes add external input.
    Unit(UnitId),
    /// `clamp:<id>`: reads the value; writes force it.
    Clamp(UnitId),
    /// `activations`: every unit value, in id order. Read only.
    Activations,
}

impl NetworkAttribute {
    fn parse(name: &str) -> Option<Self> {
        if name == "activations" {
            return Some(Self::Activations);
        }
        let (kind, index) = name.split_once(':')?;
        let unit = UnitId(index.trim().parse().ok()?);
        match kind {
            "unit" => Some(Self::Unit(unit)),
            "clamp" => Some(Self::Clamp(unit)),
            _ => None,
        }
    }
}

/// Adapts a shared [`Network`] to the [`Component`] contract.
///
/// The network is updated by a single part described as
/// `Update <label>`. Its units are exposed as `unit:<id>` and
/// `clamp:<id>` attributes, and the full activation vector as
/// `activations`.
#[derive(Clone)]
pub struct NetworkComponent {
    name: String,
    network: Arc<Mutex<Network>>,
    lock: PartLock,
}

impl NetworkComponent {
    /// Wrap `network`. The part gets a private lock.
    pub fn new(network: Arc<Mutex<Network>>) -> Self {
        let name = lock_recover(&network).label().to_string();
        Self {
            name,
            network,
            lock: PartLock::new(),
        }
    }

    /// Run the update part under `lock` instead of a private one.
    pub fn with_lock(mut self, lock: PartLock) -> Self {
        self.lock = lock;
        self
    }

    /// The wrapped network.
    pub fn network(&self) -> &Arc<Mutex<Network>> {
        &self.network
    }

    fn unit_exists(net: &Network, unit: UnitId) -> bool {
        unit.index() < net.unit_count()
    }
}

impl Component for NetworkComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        let network = Arc::clone(&self.network);
        let part = UpdatePart::new(format!("Update {}", self.name), move || {
            lock_recover(&network)
                .update()
                .map(|_| ())
                .map_err(PartError::Incomplete)
        });
        vec![part.with_lock(self.lock.clone())]
    }

    fn has_attribute(&self, attribute: &str) -> bool {
        match NetworkAttribute::parse(attribute) {
            Some(NetworkAttribute::Unit(u) | NetworkAttribute::Clamp(u)) => {
                Self::unit_exists(&lock_recover(&self.network), u)
            }
            Some(NetworkAttribute::Activations) => true,
            None => false,
        }
    }

    fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
        let net = lock_recover(&self.network);
        match NetworkAttribute::parse(attribute)? {
            NetworkAttribute::Unit(u) | NetworkAttribute::Clamp(u) => {
                net.value(u).map(AttributeValue::Scalar)
            }
            NetworkAttribute::Activations => Some(AttributeValue::from(net.values())),
        }
    }

    fn write_attribute(&self, attribute: &str, value: &AttributeValue) -> Result<(), CouplingError> {
        let rejected = |reason: &str| CouplingError::AttributeRejected {
            attribute: attribute.to_string(),
            reason: reason.to_string(),
        };
        let target = NetworkAttribute::parse(attribute).ok_or_else(|| rejected("unknown attribute"))?;
        let scalar = value
            .as_scalar()
            .ok_or_else(|| rejected("expected a scalar"))?;
        let mut net = lock_recover(&self.network);
        let result = match target {
            NetworkAttribute::Unit(u) => net.add_input(u, scalar),
            NetworkAttribute::Clamp(u) => net.set_value(u, scalar),
            NetworkAttribute::Activations => return Err(rejected("read only")),
        };
        result.map_err(|e| rejected(&e.to_string()))
    }
}

impl std::fmt::Debug for NetworkComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkComponent")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurite_network::LinearRule;

    fn component() -> (NetworkComponent, [UnitId; 2]) {
        let mut net = Network::new("pair");
        let a = net.add_unit(LinearRule::identity()).unwrap();
        let b = net.add_unit(LinearRule::identity()).unwrap();
        net.connect(a, b, 2.0).unwrap();
        (NetworkComponent::new(Arc::new(Mutex::new(net))), [a, b])
    }

    #[test]
    fn attribute_names_parse() {
        assert_eq!(
            NetworkAttribute::parse("unit:3"),
            Some(NetworkAttribute::Unit(UnitId(3)))
        );
        assert_eq!(
            NetworkAttribute::parse("clamp:0"),
            Some(NetworkAttribute::Clamp(UnitId(0)))
        );
        assert_eq!(
            NetworkAttribute::parse("activations"),
            Some(NetworkAttribute::Activations)
        );
        assert_eq!(NetworkAttribute::parse("unit:x"), None);
        assert_eq!(NetworkAttribute::parse("bias:1"), None);
    }

    #[test]
    fn exposes_existing_units_only() {
        let (c, _) = component();
        assert_eq!(c.name(), "pair");
        assert!(c.has_attribute("unit:1"));
        assert!(!c.has_attribute("unit:2"));
        assert!(c.has_attribute("activations"));
    }

    #[test]
    fn unit_write_adds_input_for_next_update() {
        let (c, [a, b]) = component();
        c.write_attribute("unit:0", &AttributeValue::Scalar(1.5))
            .unwrap();
        let parts = c.update_parts();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].description(), "Update pair");
        parts[0].run().unwrap();
        let net = lock_recover(c.network());
        assert_eq!(net.value(a), Some(1.5));
        assert_eq!(net.value(b), Some(0.0));
    }

    #[test]
    fn clamp_write_forces_value() {
        let (c, [a, _]) = component();
        c.write_attribute("clamp:0", &AttributeValue::Scalar(0.25))
            .unwrap();
        assert_eq!(c.read_attribute("unit:0"), Some(AttributeValue::Scalar(0.25)));
        assert_eq!(lock_recover(c.network()).value(a), Some(0.25));
        assert_eq!(
            c.read_attribute("activations"),
            Some(AttributeValue::from(vec![0.25, 0.0]))
        );
    }

    #[test]
    fn bad_writes_are_rejected() {
        let (c, _) = component();
        let err = c
            .write_attribute("unit:9", &AttributeValue::Scalar(1.0))
            .unwrap_err();
        assert!(matches!(err, CouplingError::AttributeRejected { .. }));
        assert!(c
            .write_attribute("activations", &AttributeValue::Scalar(1.0))
            .is_err());
        assert!(c
            .write_attribute("unit:0", &AttributeValue::from(Vec::new()))
            .is_err());
    }
}
