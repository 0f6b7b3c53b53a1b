//! Delegation to stateful aggregates.

use neurite_core::{catch_panic, PoolError, UnitId, UpdateLogicError};

use crate::action::{ActionSpec, UpdateAction};
use crate::state::NetworkCore;

/// A stateful aggregate that updates its own members.
///
/// The scheduler never looks inside: it hands the aggregate the network
/// and treats any error as "no contribution this step".
pub trait GroupUpdatable: Send + 'static {
    /// Name used in descriptions and logs.
    fn label(&self) -> &str;

    /// Advance the aggregate one step.
    fn update(&mut self, net: &mut NetworkCore) -> Result<(), UpdateLogicError>;
}

/// Runs one [`GroupUpdatable`] per step.
pub struct GroupUpdate {
    group: Box<dyn GroupUpdatable>,
    description: String,
}

impl GroupUpdate {
    /// Wrap an aggregate.
    pub fn new(group: Box<dyn GroupUpdatable>) -> Self {
        let description = format!("Update {}", group.label());
        Self { group, description }
    }

    /// The wrapped aggregate.
    pub fn group(&self) -> &dyn GroupUpdatable {
        self.group.as_ref()
    }
}

impl UpdateAction for GroupUpdate {
    fn description(&self) -> &str {
        &self.description
    }

    fn long_description(&self) -> String {
        format!("Group update delegated to {}", self.group.label())
    }

    fn spec(&self) -> Option<ActionSpec> {
        Some(ActionSpec::Group {
            label: self.group.label().to_string(),
        })
    }

    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        let group = &mut self.group;
        if let Err(e) = catch_panic(&self.description, || group.update(net)) {
            log::warn!("{}: {e}; group unchanged this step", self.description);
        }
        Ok(())
    }
}

/// Competitive layer: the member with the largest net input takes
/// `win_value`, every other unclamped member takes `lose_value`. Ties go
/// to the earliest member.
#[derive(Clone, Debug, PartialEq)]
pub struct WinnerTakeAll {
    label: String,
    members: Vec<UnitId>,
    /// Value assigned to the winner.
    pub win_value: f64,
    /// Value assigned to every other member.
    pub lose_value: f64,
    winner: Option<UnitId>,
}

impl WinnerTakeAll {
    /// A winner-take-all group over `members` with values 1 and 0.
    pub fn new(label: impl Into<String>, members: Vec<UnitId>) -> Self {
        Self {
            label: label.into(),
            members,
            win_value: 1.0,
            lose_value: 0.0,
            winner: None,
        }
    }

    /// Members, in competition order.
    pub fn members(&self) -> &[UnitId] {
        &self.members
    }

    /// The winner of the most recent step.
    pub fn winner(&self) -> Option<UnitId> {
        self.winner
    }
}

impl GroupUpdatable for WinnerTakeAll {
    fn label(&self) -> &str {
        &self.label
    }

    fn update(&mut self, net: &mut NetworkCore) -> Result<(), UpdateLogicError> {
        let mut best: Option<(UnitId, f64)> = None;
        for &id in &self.members {
            let input = net.net_input(id).ok_or_else(|| {
                UpdateLogicError::rule(self.label.as_str(), format!("member {id} does not exist"))
            })?;
            let external = net.with_unit(id, |u| u.input()).unwrap_or(0.0);
            let total = input + external;
            if best.is_none_or(|(_, b)| total > b) {
                best = Some((id, total));
            }
        }
        self.winner = best.map(|(id, _)| id);
        for &id in &self.members {
            let value = if Some(id) == self.winner {
                self.win_value
            } else {
                self.lose_value
            };
            if net.with_unit(id, |u| u.is_clamped()) == Some(false) {
                net.set_value(id, value).map_err(|e| {
                    UpdateLogicError::rule(self.label.as_str(), e.to_string())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StaticStrength;
    use crate::unit::LinearRule;

    #[test]
    fn strongest_input_wins() {
        let mut net = NetworkCore::new();
        let src = net.add_unit(Box::new(LinearRule::identity())).unwrap();
        let members: Vec<UnitId> = (0..3)
            .map(|_| net.add_unit(Box::new(LinearRule::identity())).unwrap())
            .collect();
        for (w, m) in [0.2, 0.9, 0.5].into_iter().zip(&members) {
            net.add_connection(src, *m, w, Box::new(StaticStrength)).unwrap();
        }
        net.set_value(src, 1.0).unwrap();

        let mut action = GroupUpdate::new(Box::new(WinnerTakeAll::new("wta", members.clone())));
        assert_eq!(action.description(), "Update wta");
        action.invoke(&mut net).unwrap();
        let values: Vec<f64> = members.iter().map(|m| net.value(*m).unwrap()).collect();
        assert_eq!(values, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn competition_leaves_revision_alone() {
        let mut net = NetworkCore::new();
        let members: Vec<UnitId> = (0..3)
            .map(|_| net.add_unit(Box::new(LinearRule::identity())).unwrap())
            .collect();
        net.with_unit_mut(members[2], |u| {
            u.set_value(0.4);
            u.set_clamped(true);
        });
        net.add_input(members[1], 2.0).unwrap();
        let revision = net.revision();

        let mut wta = WinnerTakeAll::new("wta", members.clone());
        for _ in 0..3 {
            wta.update(&mut net).unwrap();
        }
        assert_eq!(net.revision(), revision);
        assert_eq!(wta.winner(), Some(members[1]));
        assert_eq!(net.value(members[1]), Some(1.0));
        assert_eq!(net.value(members[2]), Some(0.4));
    }

    #[test]
    fn missing_member_is_contained() {
        let mut net = NetworkCore::new();
        let a = net.add_unit(Box::new(LinearRule::identity())).unwrap();
        net.set_value(a, 0.3).unwrap();
        let mut action = GroupUpdate::new(Box::new(WinnerTakeAll::new(
            "broken",
            vec![a, UnitId(42)],
        )));
        assert!(action.invoke(&mut net).is_ok());
        assert_eq!(net.value(a), Some(0.3));
    }
}
