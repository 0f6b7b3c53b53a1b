//! Workspace components and their schedulable update parts.

use std::sync::{Arc, Mutex, MutexGuard};

use neurite_core::{catch_panic, lock_recover, AttributeValue, CouplingError, PartError, StepId};

/// Any subsystem registered with a workspace.
///
/// Components are shared as `Arc<dyn Component>` and their parts run on
/// pool threads, so every method takes `&self`; state lives behind the
/// component's own synchronization.
pub trait Component: Send + Sync + 'static {
    /// Display name.
    fn name(&self) -> &str;

    /// Parts to run this step. Called once per tick.
    fn update_parts(&self) -> Vec<UpdatePart>;

    /// Whether `attribute` can be coupled to or from.
    fn has_attribute(&self, attribute: &str) -> bool {
        self.read_attribute(attribute).is_some()
    }

    /// Read a producer attribute. `None` if the attribute does not exist.
    fn read_attribute(&self, attribute: &str) -> Option<AttributeValue>;

    /// Write a consumer attribute.
    fn write_attribute(&self, attribute: &str, value: &AttributeValue) -> Result<(), CouplingError>;

    /// Called once this component's parts have finished the step. Under
    /// the default step that is after every component's parts and before
    /// any coupling fires.
    fn on_step_complete(&self, _step: StepId) {}
}

// ── PartLock ─────────────────────────────────────────────────────

/// Mutual-exclusion tag for update parts.
///
/// Parts holding clones of the same lock never run concurrently. A part
/// built without an explicit lock gets a private one.
#[derive(Clone, Debug, Default)]
pub struct PartLock(Arc<Mutex<()>>);

impl PartLock {
    /// A fresh, unshared lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `self` and `other` are the same lock.
    pub fn shares_with(&self, other: &PartLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        lock_recover(&self.0)
    }
}

// ── UpdatePart ───────────────────────────────────────────────────

type PartFn = Arc<dyn Fn() -> Result<(), PartError> + Send + Sync>;

/// One schedulable piece of a component's per-step update.
#[derive(Clone)]
pub struct UpdatePart {
    description: String,
    run: PartFn,
    lock: PartLock,
}

impl UpdatePart {
    /// A part with its own private lock.
    pub fn new<F>(description: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<(), PartError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            run: Arc::new(f),
            lock: PartLock::new(),
        }
    }

    /// Use `lock` instead of the private lock.
    pub fn with_lock(mut self, lock: PartLock) -> Self {
        self.lock = lock;
        self
    }

    /// What this part does.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The part's lock.
    pub fn lock(&self) -> &PartLock {
        &self.lock
    }

    /// Acquire the lock, run the callable, release the lock. Panics are
    /// contained and reported as [`PartError::Logic`].
    pub fn run(&self) -> Result<(), PartError> {
        let _held = self.lock.acquire();
        let run = &self.run;
        match catch_panic(&self.description, || Ok(run())) {
            Ok(result) => result,
            Err(e) => Err(PartError::Logic(e)),
        }
    }
}

impl std::fmt::Debug for UpdatePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePart")
            .field("description", &self.description)
            .field("lock", &self.lock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurite_core::UpdateLogicError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn run_contains_panics() {
        let part = UpdatePart::new("explode", || panic!("kaboom"));
        match part.run() {
            Err(PartError::Logic(UpdateLogicError::Panicked { origin, message })) => {
                assert_eq!(origin, "explode");
                assert_eq!(message, "kaboom");
            }
            other => panic!("expected contained panic, got {other:?}"),
        }
        // The private lock is usable after the panic.
        assert!(part.run().is_err());
    }

    #[test]
    fn shared_lock_serializes_parts() {
        let lock = PartLock::new();
        let inside = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let make = || {
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            UpdatePart::new("visit", move || {
                if inside.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                inside.store(false, Ordering::SeqCst);
                Ok(())
            })
            .with_lock(lock.clone())
        };
        let parts = [make(), make(), make(), make()];
        assert!(parts[0].lock().shares_with(parts[3].lock()));
        thread::scope(|s| {
            for part in &parts {
                s.spawn(move || {
                    for _ in 0..5 {
                        part.run().unwrap();
                    }
                });
            }
        });
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_locks_are_private() {
        let a = UpdatePart::new("a", || Ok(()));
        let b = UpdatePart::new("b", || Ok(()));
        assert!(!a.lock().shares_with(b.lock()));
        assert!(a.clone().lock().shares_with(a.lock()));
    }
}
