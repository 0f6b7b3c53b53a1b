//! Worker pool configuration.

use neurite_core::ConfigError;

/// Upper bound on an explicit worker count.
pub const MAX_WORKERS: usize = 256;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads. `None` = host parallelism.
    pub worker_count: Option<usize>,
    /// How often the dispatcher checks worker liveness while waiting at
    /// the barrier, in milliseconds. Default: 25.
    pub liveness_poll_ms: u64,
    /// Abandon a pass whose barrier has not released after this many
    /// milliseconds. `None` (the default) waits as long as every worker
    /// is alive.
    pub barrier_timeout_ms: Option<u64>,
    /// Worker thread name prefix; workers are named `<prefix>-<index>`.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            liveness_poll_ms: 25,
            barrier_timeout_ms: None,
            thread_name: "neurite-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// A config with exactly `n` workers and defaults otherwise.
    pub fn with_workers(n: usize) -> Self {
        Self {
            worker_count: Some(n),
            ..Self::default()
        }
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, MAX_WORKERS]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, MAX_WORKERS),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_WORKERS),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.liveness_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.barrier_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroBarrierTimeout);
        }
        Ok(())
    }
}
