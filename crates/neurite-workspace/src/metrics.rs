//! Per-step timing and counters.

/// What one workspace step did and how long it took.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Wall-clock time for the whole tick, in microseconds.
    pub total_us: u64,
    /// Time spent in the parts phase, in microseconds.
    pub parts_us: u64,
    /// Time spent in the couplings phase, in microseconds.
    pub couplings_us: u64,
    /// Update parts dispatched.
    pub parts_run: usize,
    /// Parts that returned an error, panicked, or could not be dispatched.
    pub part_failures: usize,
    /// Couplings that copied a value this step.
    pub couplings_fired: usize,
    /// Couplings that failed for a reason other than a removed endpoint.
    pub coupling_failures: usize,
    /// Couplings dropped because an endpoint was removed.
    pub couplings_dropped: usize,
}

impl StepMetrics {
    /// Whether every part and coupling ran cleanly.
    pub fn is_clean(&self) -> bool {
        self.part_failures == 0 && self.coupling_failures == 0 && self.couplings_dropped == 0
    }
}
