//! High-level entry point
//!
//! [`Parallelizer`] turns columns of arguments into tasks and runs them on
//! either pool flavour:
//!
//! ```no_run
//! use parallelizer::{ArgumentColumns, Parallelizer, TaskFunction};
//! use serde_json::json;
//!
//! let square = TaskFunction::new("square", &["number"], |args| {
//!     let n: i64 = args.get("number")?;
//!     Ok(json!(n * n))
//! });
//!
//! let execution = Parallelizer::new(square)
//!     .workers(4)
//!     .run_threaded(ArgumentColumns::new().column("number", 0..5))?;
//! assert!(!execution.cancelled);
//! # Ok::<(), parallelizer::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::ParallelizerConfig;
use crate::error::Result;
use crate::executor::{
    resolve_worker_count, CoordinatorSettings, Execution, ExecutionMode, Interrupt,
    ProcessPoolCoordinator, ResultTransform, ThreadPoolCoordinator, WorkerPool,
    DEFAULT_POLL_INTERVAL,
};
use crate::process::WorkerCommand;
use crate::task::{ArgumentColumns, TaskFunction};

/// Reusable runner for one task function
#[derive(Clone)]
pub struct Parallelizer {
    function: TaskFunction,
    workers: Option<usize>,
    verbose: bool,
    transform: Option<ResultTransform>,
    interrupt: Interrupt,
    poll_interval: Duration,
    worker_command: Option<WorkerCommand>,
}

impl Parallelizer {
    /// Auto-sized worker count, progress on, no transform
    pub fn new(function: TaskFunction) -> Self {
        Self {
            function,
            workers: None,
            verbose: true,
            transform: None,
            interrupt: Interrupt::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            worker_command: None,
        }
    }

    /// Settings from a loaded configuration file
    pub fn from_config(function: TaskFunction, config: &ParallelizerConfig) -> Self {
        Self {
            workers: config.pool.requested_workers(),
            verbose: config.progress.enabled,
            poll_interval: config.pool.poll_interval(),
            worker_command: config.pool.worker_command(),
            ..Self::new(function)
        }
    }

    /// Fixed worker count. Zero is rejected when a run starts.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Post-process each successful result on the coordinating thread
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(usize, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Stop early when `interrupt` is triggered. Once triggered it stays
    /// triggered, so later runs sharing it stop immediately.
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Program started for process-mode workers. Defaults to
    /// `<current executable> worker`.
    pub fn worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }

    pub fn function(&self) -> &TaskFunction {
        &self.function
    }

    fn settings(&self) -> Result<CoordinatorSettings> {
        let mut settings = CoordinatorSettings {
            workers: resolve_worker_count(self.workers)?,
            verbose: self.verbose,
            transform: None,
            poll_interval: self.poll_interval,
        };
        if let Some(transform) = &self.transform {
            settings = settings.with_transform(Arc::clone(transform));
        }
        Ok(settings)
    }

    /// Run every task on OS threads
    pub fn run_threaded(&self, columns: ArgumentColumns) -> Result<Execution> {
        self.run(ExecutionMode::Threads, columns)
    }

    /// Run every task in worker processes. The function is looked up by
    /// name in the worker program's registry.
    pub fn run_multiprocess(&self, columns: ArgumentColumns) -> Result<Execution> {
        self.run(ExecutionMode::Processes, columns)
    }

    /// Results come back in argument order, together with whether the run
    /// was cut short by the interrupt.
    pub fn run(&self, mode: ExecutionMode, columns: ArgumentColumns) -> Result<Execution> {
        let tasks = columns.into_tasks()?;
        let settings = self.settings()?;

        debug!(
            mode = %mode,
            function = %self.function.name(),
            tasks = tasks.len(),
            workers = settings.workers,
            "Starting run"
        );

        match mode {
            ExecutionMode::Threads => {
                ThreadPoolCoordinator::new(self.function.clone(), settings)
                    .execute(tasks, &self.interrupt)
            }
            ExecutionMode::Processes => {
                let command = match &self.worker_command {
                    Some(command) => command.clone(),
                    None => WorkerCommand::current_exe()?,
                };
                ProcessPoolCoordinator::new(self.function.name(), command, settings)
                    .execute(tasks, &self.interrupt)
            }
        }
    }
}

impl fmt::Debug for Parallelizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallelizer")
            .field("function", &self.function.name())
            .field("workers", &self.workers)
            .field("verbose", &self.verbose)
            .field("transform", &self.transform.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("worker_command", &self.worker_command)
            .finish()
    }
}
