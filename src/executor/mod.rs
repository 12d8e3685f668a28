//! Worker pool coordination
//!
//! Both pool flavours implement [`WorkerPool`] and are driven through the
//! same lifecycle by [`WorkerPool::execute`]:
//!
//! ```text
//! Idle → Dispatching → Collecting → Terminated            (normal)
//!                                 → Draining → Terminated (interrupted)
//! ```
//!
//! - [`ThreadPoolCoordinator`]: shared task queue, cooperative cancellation
//! - [`ProcessPoolCoordinator`]: child processes, preemptive cancellation

mod interrupt;
mod processes;
mod results;
mod runner;
mod state;
mod threads;

pub use interrupt::Interrupt;
pub use processes::ProcessPoolCoordinator;
pub use results::{Execution, ResultBuffer, ResultSlot, ResultTransform};
pub use state::{ExecutionState, ExecutionStats, StateTracker};
pub use threads::ThreadPoolCoordinator;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::Task;

/// Default sleep between process-mode polling passes; also the longest a
/// thread-mode collector waits before re-checking the interrupt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────
// Execution Mode
// ─────────────────────────────────────────────────────────────────

/// Where workers live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// OS threads sharing this process
    #[default]
    Threads,
    /// Child OS processes, no shared memory
    Processes,
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Threads => "threads",
            ExecutionMode::Processes => "processes",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "threads" | "thread" => Ok(ExecutionMode::Threads),
            "processes" | "process" => Ok(ExecutionMode::Processes),
            other => Err(Error::config_field_invalid(
                "pool.mode",
                format!("Unknown execution mode '{}'. Must be 'threads' or 'processes'", other),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Coordinator Settings
// ─────────────────────────────────────────────────────────────────

/// Construction parameters shared by both coordinators
#[derive(Clone)]
pub struct CoordinatorSettings {
    /// Number of workers started per run
    pub workers: usize,

    /// Report progress
    pub verbose: bool,

    /// Applied to every successful result, on the coordinating thread
    pub transform: Option<ResultTransform>,

    /// Collection polling interval
    pub poll_interval: Duration,
}

impl CoordinatorSettings {
    /// Settings with `workers` resolved (see [`resolve_worker_count`])
    pub fn new(workers: Option<usize>) -> Result<Self> {
        Ok(Self {
            workers: resolve_worker_count(workers)?,
            ..Self::default()
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_transform(mut self, transform: ResultTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            verbose: true,
            transform: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl fmt::Debug for CoordinatorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorSettings")
            .field("workers", &self.workers)
            .field("verbose", &self.verbose)
            .field("transform", &self.transform.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// All CPUs but one, never fewer than one
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// `None` picks [`default_worker_count`]; zero is rejected
pub fn resolve_worker_count(requested: Option<usize>) -> Result<usize> {
    match requested {
        None => Ok(default_worker_count()),
        Some(0) => Err(Error::InvalidWorkerCount(0)),
        Some(n) => Ok(n),
    }
}

// ─────────────────────────────────────────────────────────────────
// Worker Pool Contract
// ─────────────────────────────────────────────────────────────────

/// How a collection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Every dispatched task was accounted for
    Complete,
    /// The interrupt fired first
    Interrupted,
}

/// Capability set shared by the thread and process pools.
///
/// Implementations own their workers between `dispatch` and
/// `cancel`/`teardown`; the result buffer is only ever written by the
/// caller's thread.
pub trait WorkerPool {
    fn mode(&self) -> ExecutionMode;

    fn settings(&self) -> &CoordinatorSettings;

    /// Start workers and hand every task to exactly one of them
    fn dispatch(&mut self, tasks: Vec<Task>) -> Result<()>;

    /// Store completions in readiness order until all tasks are accounted
    /// for or `interrupt` fires
    fn collect(&mut self, results: &mut ResultBuffer, interrupt: &Interrupt) -> Result<Collection>;

    /// Store every already-finished result, then release the workers
    fn cancel(&mut self, results: &mut ResultBuffer) -> Result<()>;

    /// Release the workers after a completed collection. Idempotent.
    fn teardown(&mut self);

    /// Run one batch to completion or interruption
    fn execute(&mut self, tasks: Vec<Task>, interrupt: &Interrupt) -> Result<Execution>
    where
        Self: Sized,
    {
        runner::drive(self, tasks, interrupt)
    }
}
