//! The explicitly owned simulation context.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use neurite_core::{lock_recover, ComponentId, ConfigError, CouplingError, CouplingId, StepError};
use neurite_network::{BufferedUpdate, Network};
use neurite_pool::{PoolShutdownReport, WorkerPool};

use crate::config::SimulationConfig;
use crate::coupling::AttributeRef;
use crate::driver::Driver;
use crate::network_component::NetworkComponent;
use crate::updater::{StepReport, WorkspaceUpdater};
use crate::workspace::Workspace;

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from [`SimulationContext::shutdown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent shutting down.
    pub total_ms: u64,
    /// Steps committed over the context's lifetime.
    pub steps_completed: u64,
    /// Whether the driver thread (if any) was joined cleanly.
    pub driver_joined: bool,
    /// Component pool teardown.
    pub component_pool: PoolShutdownReport,
    /// Unit pool teardown.
    pub unit_pool: PoolShutdownReport,
}

// ── SimulationContext ────────────────────────────────────────────

/// Owns one workspace together with everything that steps it.
///
/// There is no process-wide simulation state: each context has its own
/// component pool, unit pool, updater, and driver. Dropping the context
/// shuts all of them down.
pub struct SimulationContext {
    config: SimulationConfig,
    workspace: Arc<Mutex<Workspace>>,
    unit_pool: Arc<WorkerPool>,
    updater: Arc<WorkspaceUpdater>,
    driver: Driver,
    shut_down: bool,
}

impl SimulationContext {
    /// Validate `config` and start both pools.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let workspace = Arc::new(Mutex::new(Workspace::new()));
        let unit_pool = Arc::new(WorkerPool::new(config.unit_pool.clone())?);
        let updater = Arc::new(WorkspaceUpdater::new(
            Arc::clone(&workspace),
            &config.updater,
        )?);
        let driver = Driver::new(Arc::clone(&updater), &config.driver);
        log::info!(
            "simulation context ready: {} component threads, {} unit threads",
            updater.pool().worker_count(),
            unit_pool.worker_count()
        );
        Ok(Self {
            config,
            workspace,
            unit_pool,
            updater,
            driver,
            shut_down: false,
        })
    }

    /// The configuration the context was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The shared workspace.
    pub fn workspace(&self) -> &Arc<Mutex<Workspace>> {
        &self.workspace
    }

    /// The pool behind parallel buffered updates.
    pub fn unit_pool(&self) -> &Arc<WorkerPool> {
        &self.unit_pool
    }

    /// The workspace updater.
    pub fn updater(&self) -> &Arc<WorkspaceUpdater> {
        &self.updater
    }

    /// The step driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// A buffered update that fans out over this context's unit pool.
    pub fn buffered_update(&self) -> BufferedUpdate {
        BufferedUpdate::parallel(Arc::clone(&self.unit_pool))
            .with_chunk_size(self.config.unit_chunk_size)
    }

    /// Register `network` as a component.
    pub fn add_network(&self, network: Network) -> (ComponentId, Arc<Mutex<Network>>) {
        let shared = Arc::new(Mutex::new(network));
        let component = NetworkComponent::new(Arc::clone(&shared));
        let id = lock_recover(&self.workspace).add_component(Arc::new(component));
        (id, shared)
    }

    /// Couple two attributes.
    pub fn couple(
        &self,
        producer: AttributeRef,
        consumer: AttributeRef,
    ) -> Result<CouplingId, CouplingError> {
        lock_recover(&self.workspace).add_coupling(producer, consumer)
    }

    /// Run one step on the calling thread.
    pub fn tick(&self) -> Result<StepReport, StepError> {
        self.driver.tick()
    }

    /// Stop any background run, empty the workspace, and reset time.
    pub fn clear(&self) {
        self.driver.shutdown();
        lock_recover(&self.workspace).clear();
        self.updater.reset_time();
    }

    /// Stop the driver after its current step, then tear down both
    /// pools. Idempotent.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport {
                driver_joined: true,
                steps_completed: self.updater.time(),
                ..ShutdownReport::default()
            };
        }
        let start = Instant::now();
        self.shut_down = true;
        let driver_joined = self.driver.shutdown();
        let component_pool = self.updater.shutdown();
        let unit_pool = self.unit_pool.shutdown();
        lock_recover(&self.workspace).clear();
        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            steps_completed: self.updater.time(),
            driver_joined,
            component_pool,
            unit_pool,
        };
        log::info!(
            "simulation context shut down after {} steps in {}ms",
            report.steps_completed,
            report.total_ms
        );
        report
    }
}

impl Drop for SimulationContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("updater", &self.updater)
            .field("driver", &self.driver)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
