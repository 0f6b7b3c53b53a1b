//! Test utilities and mock components for Neurite development.
//!
//! Network fixtures live in [`fixtures`]. The mock components here
//! implement [`Component`] with just enough behaviour to observe the
//! workspace updater from the outside.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use neurite_core::{AttributeValue, CouplingError, StepId};
use neurite_workspace::{Component, PartLock, UpdatePart};

fn rejected(attribute: &str) -> CouplingError {
    CouplingError::AttributeRejected {
        attribute: attribute.to_string(),
        reason: "mock does not accept writes".to_string(),
    }
}

/// Counts part runs and step-complete calls. Exposes `runs` for reading.
pub struct CountingComponent {
    name: String,
    parts: usize,
    runs: Arc<AtomicUsize>,
    completed: AtomicU64,
}

impl CountingComponent {
    pub fn new(name: impl Into<String>, parts: usize) -> Self {
        Self {
            name: name.into(),
            parts,
            runs: Arc::new(AtomicUsize::new(0)),
            completed: AtomicU64::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// The last step reported complete.
    pub fn last_completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Component for CountingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        (0..self.parts)
            .map(|i| {
                let runs = Arc::clone(&self.runs);
                UpdatePart::new(format!("{} part {i}", self.name), move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect()
    }

    fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
        (attribute == "runs").then(|| AttributeValue::Scalar(self.runs() as f64))
    }

    fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
        Err(rejected(attribute))
    }

    fn on_step_complete(&self, step: StepId) {
        self.completed.store(step.0, Ordering::SeqCst);
    }
}

/// Publishes its own step count on `value`.
///
/// Each part run writes a sentinel partial value, sleeps, and only then
/// writes the final value for the step, so an observer that reads in the
/// middle of the part sees a negative number.
pub struct ProducerComponent {
    value: Arc<Mutex<f64>>,
    steps: Arc<AtomicU64>,
    write_delay: Duration,
}

impl ProducerComponent {
    pub fn new(write_delay: Duration) -> Self {
        Self {
            value: Arc::new(Mutex::new(0.0)),
            steps: Arc::new(AtomicU64::new(0)),
            write_delay,
        }
    }

    pub fn value(&self) -> f64 {
        *self.value.lock().unwrap()
    }
}

impl Component for ProducerComponent {
    fn name(&self) -> &str {
        "producer"
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        let value = Arc::clone(&self.value);
        let steps = Arc::clone(&self.steps);
        let delay = self.write_delay;
        vec![UpdatePart::new("produce", move || {
            let step = steps.fetch_add(1, Ordering::SeqCst) + 1;
            *value.lock().unwrap() = -(step as f64);
            thread::sleep(delay);
            *value.lock().unwrap() = step as f64;
            Ok(())
        })]
    }

    fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
        (attribute == "value").then(|| AttributeValue::Scalar(self.value()))
    }

    fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
        Err(rejected(attribute))
    }
}

/// Records every value written to `input`.
#[derive(Default)]
pub struct RecorderComponent {
    history: Mutex<Vec<f64>>,
}

impl RecorderComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<f64> {
        self.history.lock().unwrap().clone()
    }
}

impl Component for RecorderComponent {
    fn name(&self) -> &str {
        "recorder"
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        Vec::new()
    }

    fn read_attribute(&self, attribute: &str) -> Option<AttributeValue> {
        let last = self.history.lock().unwrap().last().copied().unwrap_or(0.0);
        (attribute == "input").then_some(AttributeValue::Scalar(last))
    }

    fn write_attribute(&self, attribute: &str, value: &AttributeValue) -> Result<(), CouplingError> {
        match (attribute, value.as_scalar()) {
            ("input", Some(v)) => {
                self.history.lock().unwrap().push(v);
                Ok(())
            }
            _ => Err(rejected(attribute)),
        }
    }
}

/// Shared detector of concurrently running parts.
#[derive(Debug, Default)]
pub struct OverlapTracker {
    inside: AtomicBool,
    overlaps: AtomicUsize,
    entries: AtomicUsize,
}

impl OverlapTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Times a part entered while another was inside.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    fn visit(&self, hold: Duration) {
        self.entries.fetch_add(1, Ordering::SeqCst);
        if self.inside.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(hold);
        self.inside.store(false, Ordering::SeqCst);
    }
}

/// A component whose parts all visit one [`OverlapTracker`].
pub struct SharedLockComponent {
    name: String,
    tracker: Arc<OverlapTracker>,
    lock: Option<PartLock>,
    parts: usize,
    hold: Duration,
}

impl SharedLockComponent {
    /// `parts` parts, each holding the tracker for `hold`. With `lock`,
    /// every part runs under it.
    pub fn new(
        name: impl Into<String>,
        tracker: Arc<OverlapTracker>,
        lock: Option<PartLock>,
        parts: usize,
        hold: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            tracker,
            lock,
            parts,
            hold,
        }
    }
}

impl Component for SharedLockComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        (0..self.parts)
            .map(|i| {
                let tracker = Arc::clone(&self.tracker);
                let hold = self.hold;
                let part = UpdatePart::new(format!("{} visit {i}", self.name), move || {
                    tracker.visit(hold);
                    Ok(())
                });
                match &self.lock {
                    Some(lock) => part.with_lock(lock.clone()),
                    None => part,
                }
            })
            .collect()
    }

    fn read_attribute(&self, _: &str) -> Option<AttributeValue> {
        None
    }

    fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
        Err(rejected(attribute))
    }
}

/// Every part panics.
pub struct PanickingComponent;

impl Component for PanickingComponent {
    fn name(&self) -> &str {
        "panicking"
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        vec![UpdatePart::new("explode", || panic!("part exploded"))]
    }

    fn read_attribute(&self, _: &str) -> Option<AttributeValue> {
        None
    }

    fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
        Err(rejected(attribute))
    }
}

/// One part that sleeps for `delay`, then counts a finished run.
pub struct SlowComponent {
    delay: Duration,
    finished: Arc<AtomicUsize>,
}

impl SlowComponent {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Component for SlowComponent {
    fn name(&self) -> &str {
        "slow"
    }

    fn update_parts(&self) -> Vec<UpdatePart> {
        let delay = self.delay;
        let finished = Arc::clone(&self.finished);
        vec![UpdatePart::new("sleep", move || {
            thread::sleep(delay);
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })]
    }

    fn read_attribute(&self, _: &str) -> Option<AttributeValue> {
        None
    }

    fn write_attribute(&self, attribute: &str, _: &AttributeValue) -> Result<(), CouplingError> {
        Err(rejected(attribute))
    }
}
