//! The worker pool and its barrier pass protocol.
//!
//! # Pass protocol
//!
//! ```text
//! Dispatcher                        Workers (N)
//!     |                                 |
//!     |--send Work x M----------------->| recv → perform (catch_unwind)
//!     |--send Poison{pass} x N--------->| recv Poison → barrier.arrive(pass)
//!     |--barrier.arrive_and_watch------>|        (parks until N+1 arrivals)
//!     |   poll liveness / deadline      |
//!     |<======= release (fence) =======>|
//!     |   commit buffers                |
//! ```
//!
//! A worker parked at the barrier cannot dequeue a second poison, so the
//! N poison jobs are consumed by N distinct workers. Release therefore
//! happens only after every ordinary job enqueued ahead of the poisons
//! has finished.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use neurite_core::{catch_panic, lock_recover, ConfigError, PoolError, PoolInstanceId};

use crate::barrier::{Arrival, PassBarrier};
use crate::config::PoolConfig;
use crate::task::{Job, PassTally, Task};

thread_local! {
    static CURRENT_POOL: Cell<Option<PoolInstanceId>> = const { Cell::new(None) };
    static CURRENT_WORKER: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The pool owning the calling thread, if it is a pool worker.
pub fn current_pool() -> Option<PoolInstanceId> {
    CURRENT_POOL.with(Cell::get)
}

/// Index of the calling worker within its pool, if it is a pool worker.
pub fn current_worker() -> Option<usize> {
    CURRENT_WORKER.with(Cell::get)
}

// Compile-time assertion: WorkerPool is shared across threads by Arc.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<WorkerPool>();
    }
};

// ── Reports ──────────────────────────────────────────────────────

/// Result of a completed barrier pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    /// Barrier generation the pass ran under.
    pub pass: u64,
    /// Tasks dispatched in the pass.
    pub tasks: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
    /// Wall-clock time from dispatch to barrier release, in microseconds.
    pub elapsed_us: u64,
}

/// Cumulative counters for a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Ordinary tasks run to completion (successfully or not).
    pub tasks_executed: u64,
    /// Tasks that returned an error or panicked.
    pub tasks_failed: u64,
    /// Barrier passes that released normally.
    pub passes_completed: u64,
    /// Barrier passes abandoned because of worker loss or timeout.
    pub passes_abandoned: u64,
    /// Workers replaced after terminating.
    pub workers_respawned: u64,
}

/// Report from [`WorkerPool::shutdown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolShutdownReport {
    /// Total time spent shutting down.
    pub total_ms: u64,
    /// Workers joined cleanly.
    pub workers_joined: usize,
    /// Workers whose thread had panicked.
    pub workers_panicked: usize,
    /// Workers left detached because shutdown ran on that worker.
    pub workers_detached: usize,
}

// ── Shared worker state ──────────────────────────────────────────

struct Shared {
    id: PoolInstanceId,
    barrier: PassBarrier,
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    passes_completed: AtomicU64,
    passes_abandoned: AtomicU64,
    workers_respawned: AtomicU64,
}

// ── WorkerPool ───────────────────────────────────────────────────

/// A fixed set of named worker threads draining one FIFO job queue.
///
/// Supports two dispatch styles: [`run_pass`](Self::run_pass), which
/// blocks until every task in a batch has run and the barrier has
/// released, and [`submit`](Self::submit), which enqueues a single task
/// with no synchronization. Threads are reused for the pool's lifetime.
pub struct WorkerPool {
    shared: Arc<Shared>,
    job_tx: RwLock<Option<Sender<Job>>>,
    job_rx: Receiver<Job>,
    workers: Mutex<Vec<Option<JoinHandle<()>>>>,
    pass_lock: Mutex<()>,
    worker_count: usize,
    config: PoolConfig,
}

impl WorkerPool {
    /// Validate `config` and spawn the workers.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let worker_count = config.resolved_worker_count();
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            id: PoolInstanceId::next(),
            barrier: PassBarrier::new(worker_count + 1),
            tasks_executed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            passes_completed: AtomicU64::new(0),
            passes_abandoned: AtomicU64::new(0),
            workers_respawned: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let handle = spawn_worker(&config.thread_name, index, &job_rx, &shared)?;
            workers.push(Some(handle));
        }
        log::debug!(
            "pool {} started with {worker_count} workers ({})",
            shared.id,
            config.thread_name
        );

        Ok(Self {
            shared,
            job_tx: RwLock::new(Some(job_tx)),
            job_rx,
            workers: Mutex::new(workers),
            pass_lock: Mutex::new(()),
            worker_count,
            config,
        })
    }

    /// A pool with `n` workers and default settings.
    pub fn with_workers(n: usize) -> Result<Self, ConfigError> {
        Self::new(PoolConfig::with_workers(n))
    }

    /// Unique identity of this pool.
    pub fn id(&self) -> PoolInstanceId {
        self.shared.id
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.sender().is_none()
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> PoolStats {
        let s = &self.shared;
        PoolStats {
            tasks_executed: s.tasks_executed.load(Ordering::Relaxed),
            tasks_failed: s.tasks_failed.load(Ordering::Relaxed),
            passes_completed: s.passes_completed.load(Ordering::Relaxed),
            passes_abandoned: s.passes_abandoned.load(Ordering::Relaxed),
            workers_respawned: s.workers_respawned.load(Ordering::Relaxed),
        }
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.job_rx.len()
    }

    /// Enqueue one task with no barrier.
    pub fn submit(&self, task: Box<dyn Task>) -> Result<(), PoolError> {
        let sender = self.sender();
        let tx = sender.as_ref().ok_or(PoolError::ShutDown)?;
        tx.send(Job::Work { task, tally: None })
            .map_err(|_| PoolError::ShutDown)
    }

    /// Run `tasks` to completion across the workers.
    ///
    /// Enqueues the batch followed by one poison job per worker, then
    /// waits at the barrier. On return every task has executed exactly
    /// once and all of their writes are visible to the caller. Task
    /// failures are logged and counted in the report.
    ///
    /// Returns [`PoolError::Reentrant`] when called from one of this
    /// pool's workers. On [`PoolError::WorkerLost`] or
    /// [`PoolError::BarrierTimeout`] the pass is abandoned: tasks still
    /// queued are discarded without running, dead workers are replaced,
    /// and the pool is ready for the next pass.
    pub fn run_pass(&self, tasks: Vec<Box<dyn Task>>) -> Result<PassReport, PoolError> {
        if current_pool() == Some(self.shared.id) {
            return Err(PoolError::Reentrant);
        }
        let _pass = lock_recover(&self.pass_lock);
        let start = Instant::now();
        let task_count = tasks.len();
        let tally = Arc::new(PassTally::default());
        let pass = self.shared.barrier.generation();

        {
            let sender = self.sender();
            let tx = sender.as_ref().ok_or(PoolError::ShutDown)?;
            for task in tasks {
                tx.send(Job::Work {
                    task,
                    tally: Some(Arc::clone(&tally)),
                })
                .map_err(|_| PoolError::ShutDown)?;
            }
            for _ in 0..self.worker_count {
                tx.send(Job::Poison { pass })
                    .map_err(|_| PoolError::ShutDown)?;
            }
        }
        log::trace!(
            "pool {} pass {pass}: {task_count} tasks dispatched",
            self.shared.id
        );

        let poll = Duration::from_millis(self.config.liveness_poll_ms);
        let deadline = self
            .config
            .barrier_timeout_ms
            .map(|ms| start + Duration::from_millis(ms));
        let expected = self.shared.barrier.parties();
        let outcome = self.shared.barrier.arrive_and_watch(pass, poll, |arrived| {
            if let Some(worker) = self.first_dead_worker() {
                return Err(PoolError::WorkerLost { worker });
            }
            match deadline {
                Some(d) if Instant::now() >= d => Err(PoolError::BarrierTimeout {
                    waited_ms: start.elapsed().as_millis() as u64,
                    arrived,
                    expected,
                }),
                _ => Ok(()),
            }
        });

        match outcome {
            Ok(()) => {
                self.shared.passes_completed.fetch_add(1, Ordering::Relaxed);
                Ok(PassReport {
                    pass,
                    tasks: task_count,
                    failed: tally.failed(),
                    elapsed_us: start.elapsed().as_micros() as u64,
                })
            }
            Err(e) => {
                self.shared.passes_abandoned.fetch_add(1, Ordering::Relaxed);
                let discarded = self.discard_pass(&tally);
                log::error!(
                    "pool {} pass {pass} abandoned: {e} ({} of {task_count} tasks ran, {discarded} discarded)",
                    self.shared.id,
                    tally.executed()
                );
                self.respawn_dead_workers();
                Err(e)
            }
        }
    }

    /// Close the queue and join every worker.
    ///
    /// Jobs already queued still run. Idempotent: later calls return an
    /// empty report. When called from one of this pool's own workers
    /// (for example when the last handle is dropped inside a task), that
    /// worker is detached instead of joined.
    pub fn shutdown(&self) -> PoolShutdownReport {
        let start = Instant::now();
        let sender = self
            .job_tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return PoolShutdownReport::default();
        }
        drop(sender);

        let handles: Vec<JoinHandle<()>> = lock_recover(&self.workers)
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        let me = thread::current().id();
        let mut report = PoolShutdownReport::default();
        for handle in handles {
            if handle.thread().id() == me {
                report.workers_detached += 1;
                continue;
            }
            match handle.join() {
                Ok(()) => report.workers_joined += 1,
                Err(_) => report.workers_panicked += 1,
            }
        }
        report.total_ms = start.elapsed().as_millis() as u64;
        log::debug!(
            "pool {} shut down: {} joined, {} panicked in {}ms",
            self.shared.id,
            report.workers_joined,
            report.workers_panicked,
            report.total_ms
        );
        report
    }

    fn sender(&self) -> RwLockReadGuard<'_, Option<Sender<Job>>> {
        self.job_tx.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn first_dead_worker(&self) -> Option<usize> {
        lock_recover(&self.workers)
            .iter()
            .position(|slot| slot.as_ref().is_none_or(JoinHandle::is_finished))
    }

    /// Remove this pass's remaining jobs from the queue. Jobs belonging to
    /// other callers are put back in their original order.
    fn discard_pass(&self, tally: &Arc<PassTally>) -> usize {
        let mut discarded = 0;
        let mut keep = Vec::new();
        while let Ok(job) = self.job_rx.try_recv() {
            match job {
                Job::Work { tally: Some(t), .. } if Arc::ptr_eq(&t, tally) => discarded += 1,
                Job::Poison { .. } => {}
                other => keep.push(other),
            }
        }
        if !keep.is_empty() {
            if let Some(tx) = self.sender().as_ref() {
                for job in keep {
                    let _ = tx.send(job);
                }
            }
        }
        discarded
    }

    fn respawn_dead_workers(&self) {
        if self.is_shut_down() {
            return;
        }
        let mut workers = lock_recover(&self.workers);
        for (index, slot) in workers.iter_mut().enumerate() {
            if !slot.as_ref().is_none_or(JoinHandle::is_finished) {
                continue;
            }
            if let Some(handle) = slot.take() {
                if handle.join().is_err() {
                    log::error!("pool {}: worker {index} panicked", self.shared.id);
                }
            }
            match spawn_worker(&self.config.thread_name, index, &self.job_rx, &self.shared) {
                Ok(handle) => {
                    *slot = Some(handle);
                    self.shared.workers_respawned.fetch_add(1, Ordering::Relaxed);
                    log::info!("pool {}: respawned worker {index}", self.shared.id);
                }
                Err(e) => log::error!("pool {}: {e}", self.shared.id),
            }
        }
    }

    /// Make one worker exit as if it had died.
    #[cfg(test)]
    pub(crate) fn kill_one_worker(&self) {
        if let Some(tx) = self.sender().as_ref() {
            let _ = tx.send(Job::Exit);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("worker_count", &self.worker_count)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

// ── Worker loop ──────────────────────────────────────────────────

fn spawn_worker(
    prefix: &str,
    index: usize,
    rx: &Receiver<Job>,
    shared: &Arc<Shared>,
) -> Result<JoinHandle<()>, PoolError> {
    let rx = rx.clone();
    let shared = Arc::clone(shared);
    thread::Builder::new()
        .name(format!("{prefix}-{index}"))
        .spawn(move || worker_loop(index, rx, shared))
        .map_err(|e| PoolError::SpawnFailed {
            reason: format!("{prefix}-{index}: {e}"),
        })
}

/// Runs until the queue is closed and drained.
fn worker_loop(index: usize, rx: Receiver<Job>, shared: Arc<Shared>) {
    CURRENT_POOL.with(|c| c.set(Some(shared.id)));
    CURRENT_WORKER.with(|c| c.set(Some(index)));
    while let Ok(job) = rx.recv() {
        match job {
            Job::Work { task, tally } => run_task(index, task, tally.as_deref(), &shared),
            Job::Poison { pass } => {
                if shared.barrier.arrive(pass) == Arrival::Stale {
                    log::trace!("worker {index}: stale poison for pass {pass}");
                }
            }
            #[cfg(test)]
            Job::Exit => return,
        }
    }
}

fn run_task(worker: usize, task: Box<dyn Task>, tally: Option<&PassTally>, shared: &Shared) {
    let description = task.description().to_string();
    let result = catch_panic(&description, move || task.perform());
    let ok = match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("worker {worker}: {e}");
            shared.tasks_failed.fetch_add(1, Ordering::Relaxed);
            false
        }
    };
    shared.tasks_executed.fetch_add(1, Ordering::Relaxed);
    if let Some(t) = tally {
        t.record(ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task_fn;
    use neurite_core::UpdateLogicError;
    use std::sync::atomic::AtomicUsize;

    fn counting_tasks(n: usize, hits: &Arc<AtomicUsize>) -> Vec<Box<dyn Task>> {
        (0..n)
            .map(|_| {
                let hits = Arc::clone(hits);
                task_fn(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect()
    }

    fn wait_for_dead_worker(pool: &WorkerPool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.first_dead_worker().is_none() {
            assert!(Instant::now() < deadline, "worker did not exit");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn pass_runs_every_task_once() {
        let pool = WorkerPool::with_workers(3).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let report = pool.run_pass(counting_tasks(50, &hits)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 50);
        assert_eq!(report.tasks, 50);
        assert_eq!(report.failed, 0);
        assert_eq!(report.pass, 0);
    }

    #[test]
    fn failures_are_counted_not_propagated() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let tasks = vec![
            task_fn(|| Err(UpdateLogicError::rule("t0", "bad"))),
            task_fn(|| panic!("boom")),
            task_fn(|| Ok(())),
        ];
        let report = pool.run_pass(tasks).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(pool.stats().tasks_failed, 2);
        assert_eq!(pool.stats().tasks_executed, 3);
    }

    #[test]
    fn dead_worker_abandons_pass_and_recovers() {
        let pool = WorkerPool::with_workers(2).unwrap();
        pool.kill_one_worker();
        wait_for_dead_worker(&pool);

        let hits = Arc::new(AtomicUsize::new(0));
        let err = pool.run_pass(counting_tasks(4, &hits)).unwrap_err();
        assert!(matches!(err, PoolError::WorkerLost { .. }));
        assert!(hits.load(Ordering::SeqCst) <= 4);
        assert_eq!(pool.stats().passes_abandoned, 1);
        assert_eq!(pool.stats().workers_respawned, 1);

        let hits = Arc::new(AtomicUsize::new(0));
        pool.run_pass(counting_tasks(10, &hits)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn barrier_timeout_abandons_slow_pass() {
        let pool = WorkerPool::new(PoolConfig {
            worker_count: Some(1),
            liveness_poll_ms: 5,
            barrier_timeout_ms: Some(100),
            ..PoolConfig::default()
        })
        .unwrap();
        let tasks = vec![task_fn(|| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        })];
        let err = pool.run_pass(tasks).unwrap_err();
        assert!(matches!(err, PoolError::BarrierTimeout { expected: 2, .. }));
        assert_eq!(pool.queued(), 0);

        // Once the slow task drains, the pool serves passes again.
        thread::sleep(Duration::from_millis(400));
        let hits = Arc::new(AtomicUsize::new(0));
        pool.run_pass(counting_tasks(3, &hits)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reentrant_pass_is_rejected() {
        let pool = Arc::new(WorkerPool::with_workers(2).unwrap());
        let inner = Arc::clone(&pool);
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.submit(task_fn(move || {
            let _ = tx.send(inner.run_pass(Vec::new()));
            Ok(())
        }))
        .unwrap();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Err(PoolError::Reentrant));
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let report = pool.shutdown();
        assert_eq!(report.workers_joined, 2);
        assert!(pool.is_shut_down());
        assert_eq!(pool.submit(task_fn(|| Ok(()))), Err(PoolError::ShutDown));
        assert_eq!(pool.run_pass(Vec::new()), Err(PoolError::ShutDown));
        assert_eq!(pool.shutdown(), PoolShutdownReport::default());
    }

    #[test]
    fn workers_are_named() {
        let pool = WorkerPool::new(PoolConfig {
            worker_count: Some(1),
            thread_name: "unit-pool".into(),
            ..PoolConfig::default()
        })
        .unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.submit(task_fn(move || {
            let _ = tx.send(thread::current().name().map(str::to_owned));
            Ok(())
        }))
        .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("unit-pool-0"));
    }

    #[test]
    fn worker_index_is_visible_inside_tasks() {
        let pool = WorkerPool::with_workers(1).unwrap();
        assert_eq!(current_worker(), None);
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.submit(task_fn(move || {
            let _ = tx.send(current_worker());
            Ok(())
        }))
        .unwrap();
        assert_eq!(rx.recv().unwrap(), Some(0));
    }
}
