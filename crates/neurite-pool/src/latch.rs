//! Countdown latch for fire-and-forget dispatch.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use neurite_core::lock_recover;

/// Blocks waiters until a fixed number of completions have been counted.
///
/// Counting below zero is a no-op, so a drop guard that fires after an
/// explicit `count_down` cannot release a later latch early.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl CompletionLatch {
    /// Create a latch expecting `count` completions.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Record one completion.
    pub fn count_down(&self) {
        let mut remaining = lock_recover(&self.remaining);
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    /// Completions still outstanding.
    pub fn remaining(&self) -> usize {
        *lock_recover(&self.remaining)
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = lock_recover(&self.remaining);
        while *remaining > 0 {
            remaining = self
                .zero
                .wait(remaining)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    /// Returns `true` if the latch was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = lock_recover(&self.remaining);
        while *remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .zero
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            remaining = guard;
        }
        true
    }

    /// A guard that counts this latch down when dropped.
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        LatchGuard {
            latch: Arc::clone(self),
        }
    }
}

/// Counts its latch down on drop, including during unwinding or when
/// the owning task is discarded without running.
#[derive(Debug)]
pub struct LatchGuard {
    latch: Arc<CompletionLatch>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn zero_count_is_already_released() {
        let latch = CompletionLatch::new(0);
        latch.wait();
        assert!(latch.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn releases_after_all_guards_drop() {
        let latch = Arc::new(CompletionLatch::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = latch.guard();
                thread::spawn(move || drop(g))
            })
            .collect();
        latch.wait();
        assert_eq!(latch.remaining(), 0);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn timeout_reports_unreleased() {
        let latch = CompletionLatch::new(2);
        latch.count_down();
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
        assert_eq!(latch.remaining(), 1);
    }

    #[test]
    fn extra_count_down_saturates() {
        let latch = CompletionLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.remaining(), 0);
    }
}
