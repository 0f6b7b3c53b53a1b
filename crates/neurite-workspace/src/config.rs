//! Simulation configuration.

use neurite_core::ConfigError;
use neurite_pool::PoolConfig;

/// Configuration for a [`WorkspaceUpdater`](crate::WorkspaceUpdater).
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    /// Component pool size. `None` = host parallelism; `Some(1)` runs
    /// parts and couplings one at a time in dispatch order.
    pub threads: Option<usize>,
    /// Thread name prefix for the component pool.
    pub thread_name: String,
    /// Liveness poll interval of the component pool, in milliseconds.
    pub liveness_poll_ms: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            threads: None,
            thread_name: "neurite-component".to_string(),
            liveness_poll_ms: 25,
        }
    }
}

impl UpdaterConfig {
    /// A sequential, deterministic updater.
    pub fn sequential() -> Self {
        Self {
            threads: Some(1),
            ..Self::default()
        }
    }

    /// The pool configuration this updater runs on.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.threads,
            liveness_poll_ms: self.liveness_poll_ms,
            barrier_timeout_ms: None,
            thread_name: self.thread_name.clone(),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool_config().validate()
    }
}

/// Configuration for a [`Driver`](crate::Driver).
#[derive(Clone, Debug, Default)]
pub struct DriverConfig {
    /// Pause between steps of a background run, in milliseconds.
    pub step_delay_ms: u64,
}

/// Everything a [`SimulationContext`](crate::SimulationContext) needs.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Component pool and updater settings.
    pub updater: UpdaterConfig,
    /// Background run settings.
    pub driver: DriverConfig,
    /// Pool used by parallel buffered updates.
    pub unit_pool: PoolConfig,
    /// Units per task for buffered updates built by the context.
    pub unit_chunk_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            updater: UpdaterConfig::default(),
            driver: DriverConfig::default(),
            unit_pool: PoolConfig {
                thread_name: "neurite-unit".to_string(),
                ..PoolConfig::default()
            },
            unit_chunk_size: neurite_network::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SimulationConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.updater.validate()?;
        self.unit_pool.validate()?;
        if self.unit_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}
