//! Reusable network fixtures.
//!
//! - [`three_unit_network`]: the clamped 0.5 → n2 → n3 chain with
//!   priorities 1, 2, 3.
//! - [`chain_network`]: an identity chain of any length.
//! - [`random_network`]: a seeded random graph for determinism checks.
//! - [`counting_network`]: units that count their own updates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use neurite_core::{UnitId, UpdateLogicError};
use neurite_network::{FnRule, HebbianRule, LinearRule, Network, StaticStrength, UnitContext};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// n1 (priority 1, clamped at 0.5) → n2 (priority 2) → n3 (priority 3),
/// unit strengths, identity activations.
pub fn three_unit_network() -> (Network, [UnitId; 3]) {
    let (net, ids) = chain_network(3, 0.5);
    (net, [ids[0], ids[1], ids[2]])
}

/// `n` identity units connected head to tail with strength 1.
///
/// Unit `i` has priority `i + 1`. The first unit is clamped at
/// `first_value`.
pub fn chain_network(n: usize, first_value: f64) -> (Network, Vec<UnitId>) {
    let mut net = Network::new(format!("chain-{n}"));
    let ids: Vec<UnitId> = (0..n)
        .map(|_| net.add_unit(LinearRule::identity()).unwrap())
        .collect();
    for (i, id) in ids.iter().enumerate() {
        net.set_priority(*id, i as i32 + 1).unwrap();
    }
    for pair in ids.windows(2) {
        net.connect(pair[0], pair[1], 1.0).unwrap();
    }
    if let Some(first) = ids.first() {
        net.set_value(*first, first_value).unwrap();
        net.set_clamped(*first, true).unwrap();
    }
    (net, ids)
}

/// A seeded random network with `units` units and up to `fan_in`
/// incoming connections each.
///
/// Activations are damped linear rules, strengths are drawn from
/// `[-0.5, 0.5)`, and roughly one connection in four learns with a
/// small Hebbian rate, so values stay finite over many steps. The same
/// seed always builds the same network.
pub fn random_network(seed: u64, units: usize, fan_in: usize) -> Network {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut net = Network::new(format!("random-{seed}"));
    let ids: Vec<UnitId> = (0..units)
        .map(|_| {
            let rule = LinearRule {
                slope: rng.random_range(0.1..0.6),
                bias: rng.random_range(-0.1..0.1),
            };
            net.add_unit(rule).unwrap()
        })
        .collect();
    for &target in &ids {
        net.set_value(target, rng.random_range(-1.0..1.0)).unwrap();
        net.set_priority(target, rng.random_range(0..8)).unwrap();
        for _ in 0..fan_in {
            let source = ids[rng.random_range(0..ids.len())];
            let strength = rng.random_range(-0.5..0.5);
            if rng.random_range(0..4) == 0 {
                let rule = HebbianRule {
                    rate: 0.01,
                    bound: 1.0,
                };
                net.add_connection(source, target, strength, rule).unwrap();
            } else {
                net.add_connection(source, target, strength, StaticStrength)
                    .unwrap();
            }
        }
    }
    net
}

/// Per-unit update counters for [`counting_network`].
#[derive(Debug)]
pub struct UpdateCounts(Vec<AtomicUsize>);

impl UpdateCounts {
    fn new(n: usize) -> Self {
        Self((0..n).map(|_| AtomicUsize::new(0)).collect())
    }

    /// Updates recorded for `unit`.
    pub fn get(&self, unit: UnitId) -> usize {
        self.0[unit.index()].load(Ordering::SeqCst)
    }

    /// Whether every unit has been updated exactly `n` times.
    pub fn all_equal(&self, n: usize) -> bool {
        self.0.iter().all(|c| c.load(Ordering::SeqCst) == n)
    }

    /// Sum over all units.
    pub fn total(&self) -> usize {
        self.0.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }
}

/// `n` unconnected units whose rule counts how often it runs.
pub fn counting_network(n: usize) -> (Network, Arc<UpdateCounts>) {
    let counts = Arc::new(UpdateCounts::new(n));
    let mut net = Network::new(format!("counting-{n}"));
    for _ in 0..n {
        let counts = Arc::clone(&counts);
        let rule = FnRule::new(
            "count",
            move |ctx: &UnitContext| -> Result<f64, UpdateLogicError> {
                let seen = counts.0[ctx.id.index()].fetch_add(1, Ordering::SeqCst);
                Ok(seen as f64 + 1.0)
            },
        );
        net.add_unit(rule).unwrap();
    }
    (net, counts)
}
