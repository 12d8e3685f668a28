//! Process pool coordinator
//!
//! Every task is submitted up front as an asynchronous job; collection
//! polls the pending handles with a short sleep between passes, since no
//! blocking primitive spans the process boundary. Cancellation is
//! preemptive: after salvaging ready results the workers are killed.

use std::thread;

use tracing::debug;

use crate::error::{Error, Result};
use crate::process::protocol::JobRequest;
use crate::process::{JobHandle, ProcessPool, WorkerCommand};
use crate::task::{Task, TaskOutcome};

use super::{Collection, CoordinatorSettings, ExecutionMode, Interrupt, ResultBuffer, WorkerPool};

/// Runs a registered task function, by name, in worker processes
pub struct ProcessPoolCoordinator {
    function: String,
    command: WorkerCommand,
    settings: CoordinatorSettings,
    pool: Option<ProcessPool>,
    /// One slot per task index; cleared once collected
    pending: Vec<Option<JobHandle>>,
    outstanding: usize,
}

impl ProcessPoolCoordinator {
    /// `function` must be registered in the worker program's registry
    pub fn new(function: impl Into<String>, command: WorkerCommand, settings: CoordinatorSettings) -> Self {
        Self {
            function: function.into(),
            command,
            settings,
            pool: None,
            pending: Vec::new(),
            outstanding: 0,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    /// One non-blocking pass over the pending handles
    fn collect_ready(&mut self, results: &mut ResultBuffer) -> Result<usize> {
        self.collect_with(results, JobHandle::try_take)
    }

    /// Like [`Self::collect_ready`], but a handle whose worker is gone stays
    /// pending instead of becoming a crash
    fn collect_delivered(&mut self, results: &mut ResultBuffer) -> Result<usize> {
        self.collect_with(results, JobHandle::try_take_reply)
    }

    fn collect_with(
        &mut self,
        results: &mut ResultBuffer,
        take: fn(&JobHandle) -> Option<TaskOutcome>,
    ) -> Result<usize> {
        let mut collected = 0;

        for (index, pending) in self.pending.iter_mut().enumerate() {
            let Some(handle) = pending else {
                continue;
            };
            if let Some(outcome) = take(handle) {
                *pending = None;
                self.outstanding -= 1;
                collected += 1;
                results.store(index, outcome)?;
            }
        }

        Ok(collected)
    }
}

impl WorkerPool for ProcessPoolCoordinator {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Processes
    }

    fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    fn dispatch(&mut self, tasks: Vec<Task>) -> Result<()> {
        self.teardown();

        let pool = self.pool.insert(ProcessPool::spawn(&self.command, self.settings.workers)?);
        self.pending = (0..tasks.len()).map(|_| None).collect();

        for task in tasks {
            let index = task.index();
            let request = JobRequest {
                index,
                function: self.function.clone(),
                arguments: task.into_arguments(),
            };
            self.pending[index] = Some(pool.apply_async(request)?);
            self.outstanding += 1;
        }

        debug!(
            workers = pool.size(),
            jobs = self.outstanding,
            function = %self.function,
            "Jobs submitted to worker processes"
        );
        Ok(())
    }

    fn collect(&mut self, results: &mut ResultBuffer, interrupt: &Interrupt) -> Result<Collection> {
        if self.pool.is_none() {
            return Err(Error::Internal("process pool used before dispatch".to_string()));
        }

        loop {
            if interrupt.is_triggered() {
                return Ok(Collection::Interrupted);
            }
            self.collect_ready(results)?;
            if self.outstanding == 0 {
                return Ok(Collection::Complete);
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    fn cancel(&mut self, results: &mut ResultBuffer) -> Result<()> {
        let drained = self.collect_ready(results);

        let late = match self.pool.take() {
            Some(mut pool) => {
                pool.terminate();
                pool.join();
                // replies that reached the pipe while the workers were killed
                let late = self.collect_delivered(results);
                debug!(abandoned = self.outstanding, "Worker processes terminated");
                late
            }
            None => Ok(0),
        };
        self.pending.clear();
        self.outstanding = 0;

        drained.and(late).map(|_| ())
    }

    fn teardown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.close();
            pool.join();
        }
        self.pending.clear();
        self.outstanding = 0;
    }
}
