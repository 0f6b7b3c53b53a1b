//! Ordering semantics of the built-in update actions.

use std::sync::Arc;

use neurite_core::StepId;
use neurite_network::{
    ActionSpec, BufferedUpdate, CustomUpdate, PriorityUpdate, ScriptRegistry, UpdateAction,
    UpdateManager,
};
use neurite_pool::WorkerPool;
use neurite_test_utils::fixtures::{chain_network, counting_network, three_unit_network};

#[test]
fn three_units_under_priority() {
    let (mut net, [_, n2, n3]) = three_unit_network();
    net.set_action(Box::new(PriorityUpdate::new()));
    net.update().unwrap();
    assert_eq!(net.value(n2), Some(0.5));
    assert_eq!(net.value(n3), Some(0.5));
}

#[test]
fn three_units_under_buffered() {
    let (mut net, [_, n2, n3]) = three_unit_network();
    net.update().unwrap();
    assert_eq!(net.value(n2), Some(0.5));
    assert_eq!(net.value(n3), Some(0.0));
    net.update().unwrap();
    assert_eq!(net.value(n3), Some(0.5));
}

#[test]
fn priority_crosses_whole_chain_in_one_step() {
    let (mut net, ids) = chain_network(12, 1.0);
    net.set_action(Box::new(PriorityUpdate::new()));
    net.update().unwrap();
    assert!(ids.iter().all(|id| net.value(*id) == Some(1.0)));
}

#[test]
fn buffered_advances_one_hop_per_step() {
    let pool = Arc::new(WorkerPool::with_workers(3).unwrap());
    let (mut net, ids) = chain_network(12, 1.0);
    net.set_action(Box::new(BufferedUpdate::parallel(pool).with_chunk_size(5)));
    for step in 1..=4usize {
        net.update().unwrap();
        let reached = ids
            .iter()
            .take_while(|id| net.value(**id) == Some(1.0))
            .count();
        assert_eq!(reached, step + 1);
    }
}

#[test]
fn forty_thousand_units_on_four_workers() {
    let pool = Arc::new(WorkerPool::with_workers(4).unwrap());
    let (mut net, counts) = counting_network(40_000);
    net.set_action(Box::new(BufferedUpdate::parallel(Arc::clone(&pool))));
    for step in 1..=3 {
        assert_eq!(net.update(), Ok(StepId(step)));
        assert!(counts.all_equal(step as usize));
    }
    assert_eq!(counts.total(), 120_000);
    let stats = pool.stats();
    assert_eq!(stats.passes_completed, 3);
    assert_eq!(stats.tasks_failed, 0);
    assert_eq!(pool.queued(), 0);
}

#[test]
fn actions_run_once_each_in_list_order() {
    let (mut net, ids) = chain_network(4, 1.0);
    let manager = net.manager_mut();
    manager.clear();
    manager.add(Box::new(BufferedUpdate::inline()));
    manager.add(Box::new(PriorityUpdate::new()));
    assert_eq!(
        manager.descriptions(),
        vec!["Buffered Update", "Priority Update"]
    );
    net.update().unwrap();
    // Buffered moves the front one hop; priority then sweeps the rest.
    assert!(ids.iter().all(|id| net.value(*id) == Some(1.0)));
}

#[test]
fn unresolved_custom_script_is_a_no_op() {
    let registry = ScriptRegistry::new();
    let custom = CustomUpdate::load("missing", &registry);
    assert!(!custom.is_resolved());
    assert_eq!(custom.description(), "Custom Update: missing (unresolved)");

    let (mut net, ids) = chain_network(3, 1.0);
    net.set_action(Box::new(custom));
    net.update().unwrap();
    net.update().unwrap();
    assert_eq!(net.value(ids[1]), Some(0.0));
    assert_eq!(net.step(), StepId(2));
}

#[test]
fn specs_round_trip_through_manager() {
    let mut registry = ScriptRegistry::new();
    registry.register("sweep", || Box::new(PriorityUpdate::new()) as Box<dyn UpdateAction>);
    let specs = vec![
        ActionSpec::Buffered { chunk_size: 64 },
        ActionSpec::Custom {
            script: "sweep".into(),
        },
        ActionSpec::Priority,
    ];
    let manager = UpdateManager::from_specs(&specs, None, &registry);
    assert_eq!(manager.len(), 3);
    assert_eq!(
        manager.descriptions(),
        vec!["Buffered Update", "Custom Update: sweep", "Priority Update"]
    );
    assert_eq!(manager.specs(), specs);
}
