//! Barrier pass protocol: exactly-once execution, single release, reuse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use neurite_pool::{task_fn, CompletionLatch, Named, PoolConfig, Task, WorkerPool};
use proptest::prelude::*;

fn tally_tasks(m: usize, slots: &Arc<Vec<AtomicUsize>>) -> Vec<Box<dyn Task>> {
    (0..m)
        .map(|i| {
            let slots = Arc::clone(slots);
            Box::new(Named::new(format!("slot {i}"), move || {
                slots[i].fetch_add(1, Ordering::SeqCst);
                Ok(())
            })) as Box<dyn Task>
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_task_runs_once_and_barrier_releases_once(
        workers in 1usize..6,
        tasks in 0usize..200,
    ) {
        let pool = WorkerPool::with_workers(workers).unwrap();
        let slots: Arc<Vec<AtomicUsize>> =
            Arc::new((0..tasks).map(|_| AtomicUsize::new(0)).collect());

        let report = pool.run_pass(tally_tasks(tasks, &slots)).unwrap();

        prop_assert_eq!(report.tasks, tasks);
        prop_assert!(slots.iter().all(|s| s.load(Ordering::SeqCst) == 1));
        prop_assert_eq!(pool.stats().passes_completed, 1);
        prop_assert_eq!(pool.queued(), 0);
    }
}

#[test]
fn pool_is_reused_across_passes() {
    let pool = WorkerPool::with_workers(4).unwrap();
    for pass in 0..20u64 {
        let slots: Arc<Vec<AtomicUsize>> = Arc::new((0..33).map(|_| AtomicUsize::new(0)).collect());
        let report = pool.run_pass(tally_tasks(33, &slots)).unwrap();
        assert_eq!(report.pass, pass);
        assert!(slots.iter().all(|s| s.load(Ordering::SeqCst) == 1));
    }
    let stats = pool.stats();
    assert_eq!(stats.passes_completed, 20);
    assert_eq!(stats.tasks_executed, 20 * 33);
    assert_eq!(stats.passes_abandoned, 0);
}

#[test]
fn writes_before_release_are_visible_after() {
    let pool = WorkerPool::with_workers(3).unwrap();
    let cells: Arc<Vec<Mutex<f64>>> = Arc::new((0..64).map(|_| Mutex::new(0.0)).collect());
    let tasks: Vec<Box<dyn Task>> = (0..64)
        .map(|i| {
            let cells = Arc::clone(&cells);
            task_fn(move || {
                *cells[i].lock().unwrap() = i as f64 * 0.5;
                Ok(())
            })
        })
        .collect();
    pool.run_pass(tasks).unwrap();
    for (i, cell) in cells.iter().enumerate() {
        assert_eq!(*cell.lock().unwrap(), i as f64 * 0.5);
    }
}

#[test]
fn submit_with_latch_waits_for_all() {
    let pool = WorkerPool::new(PoolConfig {
        worker_count: Some(3),
        thread_name: "component-pool".into(),
        ..PoolConfig::default()
    })
    .unwrap();
    let latch = Arc::new(CompletionLatch::new(10));
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let guard = latch.guard();
        let done = Arc::clone(&done);
        pool.submit(task_fn(move || {
            let _guard = guard;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    }
    latch.wait();
    assert_eq!(done.load(Ordering::SeqCst), 10);
}

#[test]
fn concurrent_dispatchers_serialize_passes() {
    let pool = Arc::new(WorkerPool::with_workers(2).unwrap());
    let total = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let total = Arc::clone(&total);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let tasks: Vec<Box<dyn Task>> = (0..8)
                        .map(|_| {
                            let total = Arc::clone(&total);
                            task_fn(move || {
                                total.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            })
                        })
                        .collect();
                    pool.run_pass(tasks).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(total.load(Ordering::SeqCst), 4 * 5 * 8);
    assert_eq!(pool.stats().passes_completed, 20);
}
