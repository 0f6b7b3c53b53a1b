//! Work descriptors and the job envelope carried on the pool queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use neurite_core::UpdateLogicError;

/// A unit of work executed by exactly one pool worker.
///
/// `perform` consumes the boxed task, so a task cannot be run twice.
/// Closures returning `Result<(), UpdateLogicError>` implement `Task`
/// directly.
pub trait Task: Send + 'static {
    /// Short label used in failure logs.
    fn description(&self) -> &str {
        "task"
    }

    /// Run the task.
    fn perform(self: Box<Self>) -> Result<(), UpdateLogicError>;
}

impl<F> Task for F
where
    F: FnOnce() -> Result<(), UpdateLogicError> + Send + 'static,
{
    fn perform(self: Box<Self>) -> Result<(), UpdateLogicError> {
        (*self)()
    }
}

/// Box a closure as a task.
pub fn task_fn<F>(f: F) -> Box<dyn Task>
where
    F: FnOnce() -> Result<(), UpdateLogicError> + Send + 'static,
{
    Box::new(f)
}

/// A closure with a caller-supplied description.
pub struct Named<F> {
    description: String,
    f: F,
}

impl<F> Named<F>
where
    F: FnOnce() -> Result<(), UpdateLogicError> + Send + 'static,
{
    /// Wrap `f` so that failures are logged under `description`.
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

impl<F> Task for Named<F>
where
    F: FnOnce() -> Result<(), UpdateLogicError> + Send + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn perform(self: Box<Self>) -> Result<(), UpdateLogicError> {
        (self.f)()
    }
}

/// Per-pass execution counters shared between the dispatcher and workers.
#[derive(Debug, Default)]
pub struct PassTally {
    executed: AtomicUsize,
    failed: AtomicUsize,
}

impl PassTally {
    /// Count one executed task, and one failure if `ok` is false.
    pub fn record(&self, ok: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Tasks executed so far.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    /// Tasks that returned an error or panicked.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// An entry on the pool's job queue.
pub enum Job {
    /// An ordinary task. `tally` is set when the task belongs to a
    /// barrier pass.
    Work {
        /// The task to run.
        task: Box<dyn Task>,
        /// Counters of the owning pass, if any.
        tally: Option<Arc<PassTally>>,
    },
    /// Barrier arrival marker. Never executed.
    Poison {
        /// Barrier generation this marker belongs to.
        pass: u64,
    },
    /// Terminates the receiving worker without joining a barrier.
    #[cfg(test)]
    Exit,
}

impl Job {
    /// Whether this job is a poison marker.
    pub fn is_poison(&self) -> bool {
        matches!(self, Self::Poison { .. })
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Work { task, .. } => f
                .debug_struct("Work")
                .field("task", &task.description())
                .finish(),
            Self::Poison { pass } => f.debug_struct("Poison").field("pass", pass).finish(),
            #[cfg(test)]
            Self::Exit => f.write_str("Exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poison_is_poison() {
        assert!(Job::Poison { pass: 3 }.is_poison());
        let work = Job::Work {
            task: task_fn(|| Ok(())),
            tally: None,
        };
        assert!(!work.is_poison());
    }

    #[test]
    fn closures_and_named_tasks_perform() {
        let plain = task_fn(|| Err(UpdateLogicError::rule("t", "no")));
        assert_eq!(plain.description(), "task");
        assert!(plain.perform().is_err());

        let named: Box<dyn Task> = Box::new(Named::new("chunk 4", || Ok(())));
        assert_eq!(named.description(), "chunk 4");
        assert!(named.perform().is_ok());
    }

    #[test]
    fn tally_counts_failures() {
        let tally = PassTally::default();
        tally.record(true);
        tally.record(false);
        assert_eq!(tally.executed(), 2);
        assert_eq!(tally.failed(), 1);
    }
}
