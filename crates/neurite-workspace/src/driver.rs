//! Foreground and background stepping of a [`WorkspaceUpdater`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use neurite_core::{lock_recover, StepError};

use crate::config::DriverConfig;
use crate::updater::{StepReport, WorkspaceUpdater};

// ── Errors and reports ───────────────────────────────────────────

/// Error starting a background run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverError {
    /// A background run is already in progress.
    AlreadyRunning,
    /// The driver thread could not be spawned.
    SpawnFailed {
        /// OS error text.
        reason: String,
    },
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "driver is already running"),
            Self::SpawnFailed { reason } => write!(f, "driver thread spawn failed: {reason}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Why a background run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// [`Driver::stop`] was called.
    Requested,
    /// The requested number of steps completed.
    Completed,
    /// A tick could not start.
    Failed(StepError),
}

/// Outcome of a background run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Steps completed during the run.
    pub steps: u64,
    /// Why the run ended.
    pub reason: StopReason,
}

// ── Driver ───────────────────────────────────────────────────────

/// Runs ticks on the caller's thread or on a background thread.
///
/// [`stop`](Self::stop) never interrupts a tick: the step in flight
/// finishes and the loop exits before the next one. The inter-step delay
/// sleeps with `park_timeout`, so a stop request wakes it immediately.
pub struct Driver {
    updater: Arc<WorkspaceUpdater>,
    running: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    thread: Mutex<Option<JoinHandle<RunReport>>>,
}

impl Driver {
    /// A stopped driver for `updater`.
    pub fn new(updater: Arc<WorkspaceUpdater>, config: &DriverConfig) -> Self {
        Self {
            updater,
            running: Arc::new(AtomicBool::new(false)),
            delay_ms: Arc::new(AtomicU64::new(config.step_delay_ms)),
            thread: Mutex::new(None),
        }
    }

    /// The updater being driven.
    pub fn updater(&self) -> &Arc<WorkspaceUpdater> {
        &self.updater
    }

    /// Run a single step on the calling thread.
    pub fn tick(&self) -> Result<StepReport, StepError> {
        self.updater.tick()
    }

    /// Run `steps` steps on the calling thread, without delay.
    ///
    /// Returns the number of steps completed before the first error.
    pub fn run_for(&self, steps: u64) -> Result<u64, StepError> {
        self.updater.notify_run_started();
        let mut done = 0;
        let mut result = Ok(());
        while done < steps {
            if let Err(e) = self.updater.tick() {
                result = Err(e);
                break;
            }
            done += 1;
        }
        self.updater.notify_run_stopped(done);
        result.map(|()| done)
    }

    /// Start stepping on a background thread named `neurite-driver`.
    ///
    /// `steps = None` runs until [`stop`](Self::stop).
    pub fn run(&self, steps: Option<u64>) -> Result<(), DriverError> {
        let mut slot = lock_recover(&self.thread);
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(DriverError::AlreadyRunning);
        }
        if let Some(previous) = slot.take() {
            if let Ok(report) = previous.join() {
                log::debug!("driver: reaped earlier run of {} steps", report.steps);
            }
        }

        let updater = Arc::clone(&self.updater);
        let running = Arc::clone(&self.running);
        let delay = Arc::clone(&self.delay_ms);
        let handle = thread::Builder::new()
            .name("neurite-driver".to_string())
            .spawn(move || run_loop(&updater, &running, &delay, steps))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                DriverError::SpawnFailed {
                    reason: e.to_string(),
                }
            })?;
        *slot = Some(handle);
        Ok(())
    }

    /// Ask a background run to end after the step in flight.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = lock_recover(&self.thread).as_ref() {
            handle.thread().unpark();
        }
    }

    /// Wait for the background run to end. `None` if nothing was
    /// running or the driver thread panicked.
    pub fn join(&self) -> Option<RunReport> {
        let handle = lock_recover(&self.thread).take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                log::error!("driver thread panicked");
                None
            }
        }
    }

    /// Stop and join. Returns `false` only if the driver thread panicked.
    pub fn shutdown(&self) -> bool {
        self.stop();
        let Some(handle) = lock_recover(&self.thread).take() else {
            return true;
        };
        handle.join().is_ok()
    }

    /// Whether a background run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Pause between background steps, in milliseconds.
    pub fn step_delay(&self) -> u64 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    /// Change the pause between background steps. Takes effect from the
    /// next pause.
    pub fn set_step_delay(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::Relaxed);
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("running", &self.is_running())
            .field("step_delay_ms", &self.step_delay())
            .finish()
    }
}

fn run_loop(
    updater: &WorkspaceUpdater,
    running: &AtomicBool,
    delay_ms: &AtomicU64,
    limit: Option<u64>,
) -> RunReport {
    updater.notify_run_started();
    log::debug!("driver: run started (limit {limit:?})");
    let mut steps = 0;
    let reason = loop {
        if limit.is_some_and(|n| steps >= n) {
            break StopReason::Completed;
        }
        if !running.load(Ordering::Acquire) {
            break StopReason::Requested;
        }
        if let Err(e) = updater.tick() {
            log::error!("driver: stopping after {steps} steps: {e}");
            break StopReason::Failed(e);
        }
        steps += 1;
        if limit.is_none_or(|n| steps < n) {
            pause(running, delay_ms.load(Ordering::Relaxed));
        }
    };
    running.store(false, Ordering::Release);
    updater.notify_run_stopped(steps);
    log::debug!("driver: run stopped after {steps} steps ({reason:?})");
    RunReport { steps, reason }
}

/// Sleep for `ms` or until `running` clears.
fn pause(running: &AtomicBool, ms: u64) {
    if ms == 0 {
        return;
    }
    let deadline = Instant::now() + Duration::from_millis(ms);
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::park_timeout(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdaterConfig;
    use crate::workspace::Workspace;

    fn driver(delay_ms: u64) -> Driver {
        let updater = WorkspaceUpdater::new(
            Arc::new(Mutex::new(Workspace::new())),
            &UpdaterConfig::sequential(),
        )
        .unwrap();
        Driver::new(Arc::new(updater), &DriverConfig { step_delay_ms: delay_ms })
    }

    #[test]
    fn bounded_run_completes() {
        let d = driver(0);
        d.run(Some(7)).unwrap();
        let report = d.join().unwrap();
        assert_eq!(
            report,
            RunReport {
                steps: 7,
                reason: StopReason::Completed
            }
        );
        assert_eq!(d.updater().time(), 7);
        assert!(!d.is_running());
    }

    #[test]
    fn stop_wakes_a_long_delay() {
        let d = driver(60_000);
        d.run(None).unwrap();
        while d.updater().time() == 0 {
            thread::yield_now();
        }
        let start = Instant::now();
        d.stop();
        let report = d.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(report.reason, StopReason::Requested);
        assert_eq!(report.steps, d.updater().time());
    }

    #[test]
    fn second_run_is_rejected() {
        let d = driver(50);
        d.run(None).unwrap();
        assert_eq!(d.run(None), Err(DriverError::AlreadyRunning));
        assert!(d.shutdown());
    }

    #[test]
    fn run_for_steps_in_foreground() {
        let d = driver(0);
        assert_eq!(d.run_for(3), Ok(3));
        assert_eq!(d.tick().unwrap().step.0, 4);
        d.set_step_delay(5);
        assert_eq!(d.step_delay(), 5);
    }

    #[test]
    fn failing_tick_ends_run() {
        let d = driver(0);
        d.updater().begin_shutdown();
        d.run(None).unwrap();
        let report = d.join().unwrap();
        assert_eq!(report.reason, StopReason::Failed(StepError::ShuttingDown));
        assert_eq!(report.steps, 0);
    }
}
