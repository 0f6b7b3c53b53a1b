//! Benchmark workloads for the Neurite update engine.
//!
//! - [`reference_network`]: 10K units, fan-in 8
//! - [`stress_network`]: 100K units, fan-in 4
//! - [`coupled_ring`]: networks in one workspace, each feeding the next
//! - [`fan_in_sources`]: deterministic source selection via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use neurite_core::{CouplingError, UnitId};
use neurite_network::{LinearRule, Network, NetworkError};
use neurite_workspace::{AttributeRef, SimulationContext};

/// 10K damped linear units, each with 8 incoming connections.
pub fn reference_network(seed: u64) -> Result<Network, NetworkError> {
    build_network("reference", 10_000, 8, seed)
}

/// 100K damped linear units, each with 4 incoming connections.
pub fn stress_network(seed: u64) -> Result<Network, NetworkError> {
    build_network("stress", 100_000, 4, seed)
}

fn build_network(
    label: &str,
    units: usize,
    fan_in: u16,
    seed: u64,
) -> Result<Network, NetworkError> {
    let mut net = Network::new(label);
    let ids = (0..units)
        .map(|_| {
            net.add_unit(LinearRule {
                slope: 0.5,
                bias: 0.01,
            })
        })
        .collect::<Result<Vec<UnitId>, _>>()?;
    for (i, &target) in ids.iter().enumerate() {
        for source in fan_in_sources(units, fan_in, seed ^ i as u64) {
            net.connect(ids[source], target, 0.1)?;
        }
    }
    Ok(net)
}

/// Pick `n` source indices in `0..unit_count` from a simple hash of the
/// seed. Sources may repeat.
pub fn fan_in_sources(unit_count: usize, n: u16, seed: u64) -> Vec<usize> {
    (0..n)
        .map(|i| {
            (seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(i as u64 * 1442695040888963407)
                % unit_count as u64) as usize
        })
        .collect()
}

/// Register `count` networks of `units` units in `ctx`, each updated by
/// the context's parallel buffered action, and couple the last unit of
/// each network to the first unit of the next.
pub fn coupled_ring(
    ctx: &SimulationContext,
    count: usize,
    units: usize,
) -> Result<(), RingError> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let mut net = build_network(&format!("ring-{n}"), units, 2, n as u64)?;
        net.set_action(Box::new(ctx.buffered_update()));
        ids.push(ctx.add_network(net).0);
    }
    for (n, &producer) in ids.iter().enumerate() {
        let consumer = ids[(n + 1) % ids.len()];
        ctx.couple(
            AttributeRef::new(producer, format!("unit:{}", units - 1)),
            AttributeRef::new(consumer, "unit:0"),
        )?;
    }
    Ok(())
}

/// Failure building a [`coupled_ring`].
#[derive(Debug)]
pub enum RingError {
    /// A network could not be built.
    Network(NetworkError),
    /// Two networks could not be coupled.
    Coupling(CouplingError),
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "ring network: {e}"),
            Self::Coupling(e) => write!(f, "ring coupling: {e}"),
        }
    }
}

impl std::error::Error for RingError {}

impl From<CouplingError> for RingError {
    fn from(e: CouplingError) -> Self {
        Self::Coupling(e)
    }
}

impl From<NetworkError> for RingError {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurite_core::lock_recover;
    use neurite_pool::PoolConfig;
    use neurite_workspace::{SimulationConfig, UpdaterConfig};

    #[test]
    fn sources_are_deterministic_and_in_range() {
        let a = fan_in_sources(100, 8, 42);
        assert_eq!(a, fan_in_sources(100, 8, 42));
        assert!(a.iter().all(|&s| s < 100));
    }

    #[test]
    fn reference_network_shape() {
        let net = reference_network(1).unwrap();
        assert_eq!(net.unit_count(), 10_000);
        assert_eq!(net.connection_count(), 80_000);
    }

    #[test]
    fn ring_steps() {
        let ctx = SimulationContext::new(SimulationConfig {
            updater: UpdaterConfig::sequential(),
            unit_pool: PoolConfig::with_workers(2),
            ..SimulationConfig::default()
        })
        .unwrap();
        coupled_ring(&ctx, 3, 50).unwrap();
        assert_eq!(lock_recover(ctx.workspace()).coupling_count(), 3);
        let report = ctx.tick().unwrap();
        assert_eq!(report.metrics.couplings_fired, 3);
    }
}
