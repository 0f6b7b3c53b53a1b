//! Order-independent buffered update.

use std::ops::Range;
use std::sync::Arc;

use neurite_core::{PoolError, StepId};
use neurite_pool::{Named, Task, WorkerPool};

use crate::action::{ActionSpec, UpdateAction};
use crate::state::{NetworkCore, Slots};

/// Units per task when no chunk size is given.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Updates every unit from the previous step's committed values, then
/// commits all buffers in one pass.
///
/// With a pool, units (with their incoming connections) are split into
/// chunks of `chunk_size` and each chunk runs as one task of a barrier
/// pass. Every task reads from the same snapshot of committed values and
/// sums fan-in in a fixed order, so the result does not depend on the
/// number of workers or on scheduling. Without a pool the same work runs
/// on the calling thread.
///
/// If the pool abandons the pass, every pending buffer is discarded and
/// the network is left exactly as it was before the step.
pub struct BufferedUpdate {
    pool: Option<Arc<WorkerPool>>,
    chunk_size: usize,
}

impl BufferedUpdate {
    /// Run on the calling thread.
    pub fn inline() -> Self {
        Self {
            pool: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Fan out across `pool`.
    pub fn parallel(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool: Some(pool),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of units per task. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Units per task.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether this action dispatches onto a pool.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    fn chunk_tasks(
        &self,
        slots: &Arc<Slots>,
        values: &Arc<[f64]>,
        step: StepId,
    ) -> Vec<Box<dyn Task>> {
        let count = slots.unit_count();
        (0..count)
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(count);
                let slots = Arc::clone(slots);
                let values = Arc::clone(values);
                Box::new(Named::new(format!("units {start}..{end}"), move || {
                    update_range(&slots, &values, start..end, step);
                    Ok(())
                })) as Box<dyn Task>
            })
            .collect()
    }
}

fn update_range(slots: &Slots, values: &[f64], range: Range<usize>, step: StepId) -> usize {
    let read = |j: usize| values[j];
    range
        .map(|i| slots.update_unit(i, step, &read) + slots.update_incoming(i, step, &read))
        .sum()
}

impl UpdateAction for BufferedUpdate {
    fn description(&self) -> &str {
        if self.pool.is_some() {
            "Parallel Buffered Update"
        } else {
            "Buffered Update"
        }
    }

    fn long_description(&self) -> String {
        match &self.pool {
            Some(pool) => format!(
                "{} (All Units): chunks of {} across {} workers",
                self.description(),
                self.chunk_size,
                pool.worker_count()
            ),
            None => format!("{} (All Units)", self.description()),
        }
    }

    fn spec(&self) -> Option<ActionSpec> {
        Some(ActionSpec::Buffered {
            chunk_size: self.chunk_size,
        })
    }

    fn invoke(&mut self, net: &mut NetworkCore) -> Result<(), PoolError> {
        let step = net.step();
        let slots = Arc::clone(net.slots());
        let values = slots.snapshot();

        match &self.pool {
            None => {
                let failures = update_range(&slots, &values, 0..slots.unit_count(), step);
                if failures > 0 {
                    log::debug!("step {step}: {failures} element updates kept previous state");
                }
            }
            Some(pool) => {
                let tasks = self.chunk_tasks(&slots, &values, step);
                if let Err(e) = pool.run_pass(tasks) {
                    slots.discard_all();
                    log::error!("step {step}: buffered pass abandoned, buffers discarded: {e}");
                    return Err(e);
                }
            }
        }
        slots.commit_all();
        Ok(())
    }
}
