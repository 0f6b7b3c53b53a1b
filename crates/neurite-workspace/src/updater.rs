//! The workspace tick and the scope its step actions run in.
//!
//! # Step protocol
//!
//! Each tick runs the updater's [`StepActionManager`] once. Under the
//! default [`BufferedStep`](crate::BufferedStep) a tick looks like this:
//!
//! ```text
//! tick(t)
//!   Dispatching         submit every UpdatePart (one task each)
//!   AwaitingCompletion  latch.wait()      <- each task's guard counts down
//!                       on_step_complete(t) for every component
//!   Dispatching         submit every CouplingUpdate
//!   AwaitingCompletion  latch.wait()
//!                       drop couplings whose endpoints are gone
//!   Committed           time = t, notify listeners
//!   Idle
//! ```
//!
//! Couplings fire only after every part of every component has finished,
//! so a consumer never observes a producer value from the middle of a
//! step. A coupling fires at most once per step whatever the action list
//! asks for.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use neurite_core::{
    catch_panic, lock_recover, ComponentId, ConfigError, CouplingError, CouplingId, PoolError,
    StepError, StepId,
};
use neurite_pool::{
    current_pool, current_worker, CompletionLatch, Named, PoolShutdownReport, WorkerPool,
};

use crate::component::{Component, UpdatePart};
use crate::config::UpdaterConfig;
use crate::coupling::CouplingUpdate;
use crate::metrics::StepMetrics;
use crate::schedule::StepActionManager;
use crate::workspace::Workspace;

// Compile-time assertion: the updater is shared with the driver thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<WorkspaceUpdater>();
    }
};

// ── UpdaterState ─────────────────────────────────────────────────

/// Where the updater is within a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdaterState {
    /// No tick in progress.
    Idle,
    /// Submitting tasks to the component pool.
    Dispatching,
    /// Waiting for submitted tasks to finish.
    AwaitingCompletion,
    /// The step has finished and time has advanced.
    Committed,
}

impl UpdaterState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Dispatching,
            2 => Self::AwaitingCompletion,
            3 => Self::Committed,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Dispatching => 1,
            Self::AwaitingCompletion => 2,
            Self::Committed => 3,
        }
    }
}

// ── Listener ─────────────────────────────────────────────────────

/// Result of one committed step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// The step that committed.
    pub step: StepId,
    /// What the step did.
    pub metrics: StepMetrics,
}

/// One update part starting or finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartEvent<'a> {
    /// The step the part belongs to.
    pub step: StepId,
    /// Name of the component that supplied the part.
    pub component: &'a str,
    /// The part's description.
    pub part: &'a str,
    /// Index of the pool worker running the part.
    pub worker: Option<usize>,
}

/// Observer of updater progress. Every method defaults to doing nothing.
///
/// Part events arrive on pool worker threads, concurrently when parts run
/// in parallel. Everything else arrives on the ticking thread. Panics in
/// a listener are logged and swallowed.
pub trait UpdaterListener: Send + Sync {
    /// A driver run is starting.
    fn run_started(&self) {}

    /// An update part is about to run.
    fn part_started(&self, _event: &PartEvent<'_>) {}

    /// An update part has returned, successfully or not.
    fn part_finished(&self, _event: &PartEvent<'_>) {}

    /// Every coupling has been offered the step's values.
    fn couplings_updated(&self, _step: StepId) {}

    /// A step has committed.
    fn step_committed(&self, _report: &StepReport) {}

    /// A driver run has ended after `steps` steps.
    fn run_stopped(&self, _steps: u64) {}

    /// The component pool was replaced by one of `threads` workers.
    fn threads_changed(&self, _threads: usize) {}
}

type Listeners = Arc<[Arc<dyn UpdaterListener>]>;

fn notify_all(listeners: &[Arc<dyn UpdaterListener>], f: impl Fn(&dyn UpdaterListener)) {
    for listener in listeners {
        let result = catch_panic("listener", || {
            f(listener.as_ref());
            Ok(())
        });
        if let Err(e) = result {
            log::warn!("{e}");
        }
    }
}

// ── ResizeError ──────────────────────────────────────────────────

/// Error from [`WorkspaceUpdater::set_threads`].
#[derive(Clone, Debug, PartialEq)]
pub enum ResizeError {
    /// The requested pool is invalid or could not start.
    Config(ConfigError),
    /// The updater is shutting down.
    ShuttingDown,
}

impl std::fmt::Display for ResizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "cannot resize component pool: {e}"),
            Self::ShuttingDown => write!(f, "updater is shutting down"),
        }
    }
}

impl std::error::Error for ResizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::ShuttingDown => None,
        }
    }
}

impl From<ConfigError> for ResizeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ── WorkspaceUpdater ─────────────────────────────────────────────

/// Sequences component parts and couplings across a worker pool.
///
/// One tick runs at a time; concurrent callers queue on an internal
/// lock. Failures inside parts or couplings are logged and counted in
/// the step's [`StepMetrics`] but never fail the tick.
pub struct WorkspaceUpdater {
    workspace: Arc<Mutex<Workspace>>,
    pool: Mutex<Arc<WorkerPool>>,
    config: Mutex<UpdaterConfig>,
    actions: Mutex<StepActionManager>,
    state: AtomicU8,
    time: AtomicU64,
    listeners: Mutex<Vec<Arc<dyn UpdaterListener>>>,
    tick_lock: Mutex<()>,
    shutting_down: AtomicBool,
}

impl WorkspaceUpdater {
    /// Validate `config` and start a component pool for `workspace`.
    pub fn new(
        workspace: Arc<Mutex<Workspace>>,
        config: &UpdaterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = WorkerPool::new(config.pool_config())?;
        let updater = Self::with_pool(workspace, Arc::new(pool));
        *lock_recover(&updater.config) = config.clone();
        Ok(updater)
    }

    /// Run `workspace` on an existing pool.
    pub fn with_pool(workspace: Arc<Mutex<Workspace>>, pool: Arc<WorkerPool>) -> Self {
        let config = UpdaterConfig {
            threads: Some(pool.worker_count()),
            ..UpdaterConfig::default()
        };
        Self {
            workspace,
            pool: Mutex::new(pool),
            config: Mutex::new(config),
            actions: Mutex::new(StepActionManager::new()),
            state: AtomicU8::new(UpdaterState::Idle.as_u8()),
            time: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            tick_lock: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The workspace being stepped.
    pub fn workspace(&self) -> &Arc<Mutex<Workspace>> {
        &self.workspace
    }

    /// The current component pool.
    pub fn pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&lock_recover(&self.pool))
    }

    /// Workers in the current component pool.
    pub fn threads(&self) -> usize {
        self.pool().worker_count()
    }

    /// Replace the component pool with one of `threads` workers (`None`
    /// for host parallelism).
    ///
    /// Waits for an in-flight tick; a background run carries on with the
    /// new pool from its next step. The old pool is shut down unless it
    /// is still shared elsewhere, and its report is returned.
    pub fn set_threads(&self, threads: Option<usize>) -> Result<PoolShutdownReport, ResizeError> {
        let mut config = lock_recover(&self.config).clone();
        config.threads = threads;
        config.validate()?;
        let fresh = Arc::new(WorkerPool::new(config.pool_config())?);
        let count = fresh.worker_count();

        let _tick = lock_recover(&self.tick_lock);
        if self.is_shutting_down() {
            fresh.shutdown();
            return Err(ResizeError::ShuttingDown);
        }
        let old = std::mem::replace(&mut *lock_recover(&self.pool), fresh);
        *lock_recover(&self.config) = config;
        let report = match Arc::try_unwrap(old) {
            Ok(pool) => pool.shutdown(),
            Err(shared) => {
                log::debug!("previous component pool {} is shared; left running", shared.id());
                PoolShutdownReport::default()
            }
        };
        log::info!("component pool resized to {count} threads");
        self.notify(|l| l.threads_changed(count));
        Ok(report)
    }

    /// Edit the step action list. Waits for an in-flight tick. Must not
    /// be called from a listener or a step action.
    pub fn with_actions<R>(&self, f: impl FnOnce(&mut StepActionManager) -> R) -> R {
        f(&mut lock_recover(&self.actions))
    }

    /// Current position in the step protocol.
    pub fn state(&self) -> UpdaterState {
        UpdaterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of committed steps.
    pub fn time(&self) -> u64 {
        self.time.load(Ordering::Acquire)
    }

    /// Set time back to zero. Couplings forget which step they last
    /// fired for. Waits for an in-flight tick to finish.
    pub fn reset_time(&self) {
        let _tick = lock_recover(&self.tick_lock);
        self.time.store(0, Ordering::Release);
        for coupling in lock_recover(&self.workspace).coupling_snapshot() {
            coupling.reset();
        }
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn UpdaterListener>) {
        lock_recover(&self.listeners).push(listener);
    }

    /// Refuse new ticks. A tick already running completes.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// Whether [`begin_shutdown`](Self::begin_shutdown) has run.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Refuse new ticks, wait for the current one, then stop the
    /// component pool.
    pub fn shutdown(&self) -> PoolShutdownReport {
        self.begin_shutdown();
        let _tick = lock_recover(&self.tick_lock);
        self.pool().shutdown()
    }

    /// Run one complete step.
    ///
    /// Fails only when the updater is shutting down or when called from
    /// one of its own pool's workers.
    pub fn tick(&self) -> Result<StepReport, StepError> {
        if current_pool() == Some(self.pool().id()) {
            return Err(StepError::Pool(PoolError::Reentrant));
        }
        let _tick = lock_recover(&self.tick_lock);
        let pool = self.pool();
        if self.is_shutting_down() || pool.is_shut_down() {
            return Err(StepError::ShuttingDown);
        }

        let start = Instant::now();
        let step = StepId(self.time() + 1);
        log::trace!("step {step}: begin");

        let (components, couplings) = {
            let ws = lock_recover(&self.workspace);
            (ws.component_snapshot(), ws.coupling_snapshot())
        };
        let listeners: Listeners = lock_recover(&self.listeners).clone().into();
        let mut scope = StepScope {
            updater: self,
            pool,
            step,
            components,
            couplings,
            listeners,
            metrics: StepMetrics::default(),
            removed: Vec::new(),
        };
        lock_recover(&self.actions).invoke_all(&mut scope);
        let StepScope {
            mut metrics,
            mut removed,
            ..
        } = scope;

        if !removed.is_empty() {
            removed.sort();
            removed.dedup();
            let dropped = lock_recover(&self.workspace).drop_couplings(&removed);
            for coupling in &dropped {
                log::warn!("step {step}: {coupling} lost an endpoint and was dropped");
            }
            metrics.couplings_dropped = dropped.len();
        }

        self.time.store(step.0, Ordering::Release);
        self.set_state(UpdaterState::Committed);
        metrics.total_us = start.elapsed().as_micros() as u64;
        let report = StepReport { step, metrics };
        log::trace!("step {step}: committed in {}us", report.metrics.total_us);
        self.notify(|l| l.step_committed(&report));
        self.set_state(UpdaterState::Idle);
        Ok(report)
    }

    pub(crate) fn notify_run_started(&self) {
        self.notify(|l| l.run_started());
    }

    pub(crate) fn notify_run_stopped(&self, steps: u64) {
        self.notify(|l| l.run_stopped(steps));
    }

    fn set_state(&self, state: UpdaterState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn notify(&self, f: impl Fn(&dyn UpdaterListener)) {
        let listeners = lock_recover(&self.listeners).clone();
        notify_all(&listeners, f);
    }
}

impl std::fmt::Debug for WorkspaceUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceUpdater")
            .field("time", &self.time())
            .field("state", &self.state())
            .field("pool", &self.pool())
            .finish()
    }
}

// ── StepScope ────────────────────────────────────────────────────

/// What a [`StepAction`](crate::StepAction) can do during one tick.
///
/// The scope works on the components and couplings registered when the
/// tick began. Components added mid-tick join the next step; couplings
/// found with a removed endpoint are dropped once the tick ends.
pub struct StepScope<'a> {
    updater: &'a WorkspaceUpdater,
    pool: Arc<WorkerPool>,
    step: StepId,
    components: Vec<(ComponentId, Arc<dyn Component>)>,
    couplings: Vec<Arc<CouplingUpdate>>,
    listeners: Listeners,
    metrics: StepMetrics,
    removed: Vec<CouplingId>,
}

impl StepScope<'_> {
    /// The step being run.
    pub fn step(&self) -> StepId {
        self.step
    }

    /// Components taking part in this step, in registration order.
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components.iter().map(|(id, _)| *id).collect()
    }

    /// Counters accumulated so far this step.
    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// Run every component's parts in parallel and wait for all of them,
    /// then call each component's `on_step_complete`.
    pub fn update_all_components(&mut self) {
        let targets = self.components.clone();
        self.update_components(&targets);
    }

    /// Run one component's parts and its `on_step_complete`. Returns
    /// `false` if the component is not part of this step.
    pub fn update_component(&mut self, id: ComponentId) -> bool {
        let Some(target) = self.components.iter().find(|(c, _)| *c == id).cloned() else {
            return false;
        };
        self.update_components(std::slice::from_ref(&target));
        true
    }

    /// Fire every coupling, then tell listeners the couplings are done.
    pub fn update_all_couplings(&mut self) {
        let all = self.couplings.clone();
        self.update_couplings(all);
        let step = self.step;
        notify_all(&self.listeners, |l| l.couplings_updated(step));
    }

    /// Fire the couplings whose producer is `id`.
    pub fn update_outgoing_couplings(&mut self, id: ComponentId) {
        let selected = self.select_couplings(|c| c.coupling().producer.component == id);
        self.update_couplings(selected);
    }

    /// Fire the couplings whose consumer is `id`.
    pub fn update_incoming_couplings(&mut self, id: ComponentId) {
        let selected = self.select_couplings(|c| c.coupling().consumer.component == id);
        self.update_couplings(selected);
    }

    fn select_couplings(
        &self,
        keep: impl Fn(&CouplingUpdate) -> bool,
    ) -> Vec<Arc<CouplingUpdate>> {
        self.couplings.iter().filter(|c| keep(c)).cloned().collect()
    }

    fn update_components(&mut self, targets: &[(ComponentId, Arc<dyn Component>)]) {
        let phase = Instant::now();
        let parts = self.gather_parts(targets);
        self.metrics.parts_run += parts.len();
        self.metrics.part_failures += self.run_parts(parts);
        let step = self.step;
        for (_, component) in targets {
            let hook = catch_panic(component.name(), || {
                component.on_step_complete(step);
                Ok(())
            });
            if let Err(e) = hook {
                log::warn!("step {step}: step-complete hook failed: {e}");
            }
        }
        self.metrics.parts_us += phase.elapsed().as_micros() as u64;
    }

    fn gather_parts(
        &mut self,
        targets: &[(ComponentId, Arc<dyn Component>)],
    ) -> Vec<(Arc<str>, UpdatePart)> {
        let mut parts = Vec::new();
        for (_, component) in targets {
            match catch_panic(component.name(), || Ok(component.update_parts())) {
                Ok(p) => {
                    let name: Arc<str> = Arc::from(component.name());
                    parts.extend(p.into_iter().map(|part| (Arc::clone(&name), part)));
                }
                Err(e) => {
                    self.metrics.part_failures += 1;
                    log::warn!("could not gather parts: {e}");
                }
            }
        }
        parts
    }

    /// Submit every part and wait for all of them. Returns the number of
    /// parts that failed or could not be submitted.
    fn run_parts(&self, parts: Vec<(Arc<str>, UpdatePart)>) -> usize {
        let step = self.step;
        self.updater.set_state(UpdaterState::Dispatching);
        let latch = Arc::new(CompletionLatch::new(parts.len()));
        let failures = Arc::new(AtomicUsize::new(0));
        for (component, part) in parts {
            let guard = latch.guard();
            let failed = Arc::clone(&failures);
            let listeners = Arc::clone(&self.listeners);
            let task = Named::new(part.description().to_string(), move || {
                let _done = guard;
                let event = PartEvent {
                    step,
                    component: &component,
                    part: part.description(),
                    worker: current_worker(),
                };
                notify_all(&listeners, |l| l.part_started(&event));
                if let Err(e) = part.run() {
                    failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("step {step}: part '{}' failed: {e}", part.description());
                }
                notify_all(&listeners, |l| l.part_finished(&event));
                Ok(())
            });
            // A rejected task is dropped with its guard, which counts
            // the latch down.
            if let Err(e) = self.pool.submit(Box::new(task)) {
                failures.fetch_add(1, Ordering::Relaxed);
                log::error!("step {step}: part not dispatched: {e}");
            }
        }
        self.updater.set_state(UpdaterState::AwaitingCompletion);
        latch.wait();
        failures.load(Ordering::Relaxed)
    }

    fn update_couplings(&mut self, couplings: Vec<Arc<CouplingUpdate>>) {
        let phase = Instant::now();
        let outcome = self.run_couplings(couplings);
        self.metrics.couplings_fired += outcome.fired;
        self.metrics.coupling_failures += outcome.failed;
        self.removed.extend(outcome.removed);
        self.metrics.couplings_us += phase.elapsed().as_micros() as u64;
    }

    fn run_couplings(&self, couplings: Vec<Arc<CouplingUpdate>>) -> CouplingOutcome {
        let step = self.step;
        self.updater.set_state(UpdaterState::Dispatching);
        let latch = Arc::new(CompletionLatch::new(couplings.len()));
        let fired = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let removed: Arc<Mutex<Vec<CouplingId>>> = Arc::new(Mutex::new(Vec::new()));
        for coupling in couplings {
            let guard = latch.guard();
            let fired = Arc::clone(&fired);
            let failed_count = Arc::clone(&failed);
            let removed = Arc::clone(&removed);
            let task = Named::new(coupling.coupling().to_string(), move || {
                let _done = guard;
                match coupling.invoke(step) {
                    Ok(true) => {
                        fired.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {}
                    Err(CouplingError::ComponentRemoved { .. }) => {
                        lock_recover(&removed).push(coupling.id());
                    }
                    Err(e) => {
                        failed_count.fetch_add(1, Ordering::Relaxed);
                        log::warn!("step {step}: {}: {e}", coupling.coupling());
                    }
                }
                Ok(())
            });
            if let Err(e) = self.pool.submit(Box::new(task)) {
                failed.fetch_add(1, Ordering::Relaxed);
                log::error!("step {step}: coupling not dispatched: {e}");
            }
        }
        self.updater.set_state(UpdaterState::AwaitingCompletion);
        latch.wait();
        let removed = std::mem::take(&mut *lock_recover(&removed));
        CouplingOutcome {
            fired: fired.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            removed,
        }
    }
}

struct CouplingOutcome {
    fired: usize,
    failed: usize,
    removed: Vec<CouplingId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::AttributeRef;
    use neurite_core::{AttributeValue, PartError, UpdateLogicError};

    struct Tally {
        runs: Arc<AtomicUsize>,
        completes: AtomicUsize,
        fail: bool,
    }

    impl Component for Tally {
        fn name(&self) -> &str {
            "tally"
        }

        fn update_parts(&self) -> Vec<UpdatePart> {
            let runs = Arc::clone(&self.runs);
            let fail = self.fail;
            vec![UpdatePart::new("count", move || {
                runs.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(PartError::Logic(UpdateLogicError::Rule {
                        origin: "tally".into(),
                        reason: "asked to fail".into(),
                    }))
                } else {
                    Ok(())
                }
            })]
        }

        fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
            (attribute == "runs")
                .then(|| AttributeValue::Scalar(self.runs.load(Ordering::SeqCst) as f64))
        }

        fn write_attribute(&self, _: &str, _: &AttributeValue) -> Result<(), CouplingError> {
            Ok(())
        }

        fn on_step_complete(&self, _step: StepId) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tally(fail: bool) -> (Arc<Tally>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let t = Arc::new(Tally {
            runs: Arc::clone(&runs),
            completes: AtomicUsize::new(0),
            fail,
        });
        (t, runs)
    }

    fn updater(threads: usize) -> WorkspaceUpdater {
        let config = UpdaterConfig {
            threads: Some(threads),
            ..UpdaterConfig::default()
        };
        WorkspaceUpdater::new(Arc::new(Mutex::new(Workspace::new())), &config).unwrap()
    }

    #[test]
    fn tick_runs_every_part_once_and_advances_time() {
        let up = updater(3);
        let mut handles = Vec::new();
        for _ in 0..5 {
            let (t, runs) = tally(false);
            lock_recover(up.workspace()).add_component(t.clone());
            handles.push((t, runs));
        }
        for expected in 1..=4u64 {
            let report = up.tick().unwrap();
            assert_eq!(report.step, StepId(expected));
            assert_eq!(report.metrics.parts_run, 5);
            assert!(report.metrics.is_clean());
        }
        for (t, runs) in &handles {
            assert_eq!(runs.load(Ordering::SeqCst), 4);
            assert_eq!(t.completes.load(Ordering::SeqCst), 4);
        }
        assert_eq!(up.time(), 4);
        assert_eq!(up.state(), UpdaterState::Idle);
    }

    #[test]
    fn part_failures_are_counted_not_fatal() {
        let up = updater(2);
        let (bad, _) = tally(true);
        let (good, good_runs) = tally(false);
        lock_recover(up.workspace()).add_component(bad);
        lock_recover(up.workspace()).add_component(good);
        let report = up.tick().unwrap();
        assert_eq!(report.metrics.part_failures, 1);
        assert_eq!(good_runs.load(Ordering::SeqCst), 1);
        assert_eq!(up.time(), 1);
    }

    #[test]
    fn reset_time_rewinds_couplings() {
        let up = updater(1);
        let (a, _) = tally(false);
        let (b, _) = tally(false);
        let (ia, ib) = {
            let mut ws = lock_recover(up.workspace());
            (ws.add_component(a), ws.add_component(b))
        };
        lock_recover(up.workspace())
            .add_coupling(AttributeRef::new(ia, "runs"), AttributeRef::new(ib, "runs"))
            .unwrap();
        assert_eq!(up.tick().unwrap().metrics.couplings_fired, 1);
        up.reset_time();
        assert_eq!(up.time(), 0);
        let report = up.tick().unwrap();
        assert_eq!(report.step, StepId(1));
        assert_eq!(report.metrics.couplings_fired, 1);
    }

    #[test]
    fn shutdown_rejects_ticks() {
        let up = updater(1);
        up.tick().unwrap();
        up.shutdown();
        assert_eq!(up.tick(), Err(StepError::ShuttingDown));
        assert_eq!(up.time(), 1);
    }

    #[test]
    fn listeners_see_each_commit() {
        struct Steps(Mutex<Vec<StepId>>);
        impl UpdaterListener for Steps {
            fn step_committed(&self, report: &StepReport) {
                self.0.lock().unwrap().push(report.step);
            }
        }
        let up = updater(1);
        let steps = Arc::new(Steps(Mutex::new(Vec::new())));
        up.add_listener(steps.clone());
        up.tick().unwrap();
        up.tick().unwrap();
        assert_eq!(*steps.0.lock().unwrap(), vec![StepId(1), StepId(2)]);
    }

    struct Events(Mutex<Vec<String>>);

    impl UpdaterListener for Events {
        fn part_started(&self, event: &PartEvent<'_>) {
            self.0.lock().unwrap().push(format!(
                "start {} {} {:?}",
                event.component, event.part, event.worker
            ));
        }

        fn part_finished(&self, event: &PartEvent<'_>) {
            self.0.lock().unwrap().push(format!("finish {}", event.part));
        }

        fn couplings_updated(&self, step: StepId) {
            self.0.lock().unwrap().push(format!("couplings {step}"));
        }

        fn threads_changed(&self, threads: usize) {
            self.0.lock().unwrap().push(format!("threads {threads}"));
        }
    }

    #[test]
    fn part_events_name_worker_and_precede_couplings() {
        let up = updater(1);
        let (a, _) = tally(false);
        let (b, _) = tally(false);
        let (ia, ib) = {
            let mut ws = lock_recover(up.workspace());
            (ws.add_component(a), ws.add_component(b))
        };
        lock_recover(up.workspace())
            .add_coupling(AttributeRef::new(ia, "runs"), AttributeRef::new(ib, "runs"))
            .unwrap();
        let events = Arc::new(Events(Mutex::new(Vec::new())));
        up.add_listener(events.clone());
        up.tick().unwrap();
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start tally count Some(0)",
                "finish count",
                "start tally count Some(0)",
                "finish count",
                "couplings 1",
            ]
        );
    }

    #[test]
    fn set_threads_swaps_pool_between_ticks() {
        let up = updater(1);
        let (t, runs) = tally(false);
        lock_recover(up.workspace()).add_component(t);
        let events = Arc::new(Events(Mutex::new(Vec::new())));
        up.add_listener(events.clone());
        up.tick().unwrap();
        let old_id = up.pool().id();

        let report = up.set_threads(Some(3)).unwrap();
        assert_eq!(report.workers_joined, 1);
        assert_eq!(up.threads(), 3);
        assert_ne!(up.pool().id(), old_id);
        assert!(events.0.lock().unwrap().contains(&"threads 3".to_string()));

        let report = up.tick().unwrap();
        assert_eq!(report.step, StepId(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert_eq!(
            up.set_threads(Some(0)),
            Err(ResizeError::Config(ConfigError::ZeroWorkers))
        );
        assert_eq!(up.threads(), 3);

        up.shutdown();
        assert_eq!(up.set_threads(Some(2)), Err(ResizeError::ShuttingDown));
    }

    #[test]
    fn empty_action_list_only_advances_time() {
        let up = updater(2);
        let (t, runs) = tally(false);
        lock_recover(up.workspace()).add_component(t);
        up.with_actions(|actions| actions.clear());
        let report = up.tick().unwrap();
        assert_eq!(report.step, StepId(1));
        assert_eq!(report.metrics.parts_run, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        up.with_actions(|actions| actions.restore_default());
        assert_eq!(up.tick().unwrap().metrics.parts_run, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
