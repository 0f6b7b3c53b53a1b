//! Generation barrier for the pass protocol.
//!
//! The barrier is sized for every worker plus the dispatcher. Workers
//! arrive when they dequeue a poison job; the dispatcher arrives after
//! enqueuing the batch and then watches the pass while it waits. A pass
//! is identified by the barrier generation current at dispatch time, so
//! an arrival tagged with an older generation (left behind by an
//! abandoned pass) returns immediately instead of corrupting the count.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use neurite_core::{lock_recover, PoolError};

#[derive(Debug)]
struct BarrierState {
    generation: u64,
    arrived: usize,
}

/// Outcome of a worker's arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Arrival {
    /// The generation completed (or was abandoned) after this arrival.
    Released,
    /// The arrival belonged to a generation that had already ended.
    Stale,
}

#[derive(Debug)]
pub(crate) struct PassBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl PassBarrier {
    pub(crate) fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                generation: 0,
                arrived: 0,
            }),
            released: Condvar::new(),
        }
    }

    pub(crate) fn parties(&self) -> usize {
        self.parties
    }

    pub(crate) fn generation(&self) -> u64 {
        lock_recover(&self.state).generation
    }

    /// Arrive for `pass` and block until the generation ends.
    pub(crate) fn arrive(&self, pass: u64) -> Arrival {
        let mut state = lock_recover(&self.state);
        if state.generation != pass {
            return Arrival::Stale;
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            self.release(&mut state);
            return Arrival::Released;
        }
        while state.generation == pass {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        Arrival::Released
    }

    /// Dispatcher arrival. Wakes every `poll` to run `watch` with the
    /// current arrival count; an error from `watch` abandons the
    /// generation, releasing any workers already parked on it.
    pub(crate) fn arrive_and_watch(
        &self,
        pass: u64,
        poll: Duration,
        mut watch: impl FnMut(usize) -> Result<(), PoolError>,
    ) -> Result<(), PoolError> {
        let mut state = lock_recover(&self.state);
        if state.generation != pass {
            return Ok(());
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            self.release(&mut state);
            return Ok(());
        }
        loop {
            let (guard, _) = self
                .released
                .wait_timeout(state, poll)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state = guard;
            if state.generation != pass {
                return Ok(());
            }
            if let Err(e) = watch(state.arrived) {
                self.release(&mut state);
                return Err(e);
            }
        }
    }

    fn release(&self, state: &mut BarrierState) {
        state.generation += 1;
        state.arrived = 0;
        self.released.notify_all();
    }
}
