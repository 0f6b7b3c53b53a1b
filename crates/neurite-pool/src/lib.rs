//! Barrier-synchronized worker pool for Neurite update passes.
//!
//! A [`WorkerPool`] owns a fixed set of named threads draining one FIFO
//! job queue. Buffered network updates fan a pass of chunk tasks out
//! with [`WorkerPool::run_pass`]; the workspace updater dispatches
//! component parts with [`WorkerPool::submit`] and waits on a
//! [`CompletionLatch`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod barrier;
pub mod config;
pub mod latch;
pub mod pool;
pub mod task;

pub use config::{PoolConfig, MAX_WORKERS};
pub use latch::{CompletionLatch, LatchGuard};
pub use pool::{current_pool, current_worker, PassReport, PoolShutdownReport, PoolStats, WorkerPool};
pub use task::{task_fn, Job, Named, PassTally, Task};
