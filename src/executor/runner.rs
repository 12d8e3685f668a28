//! Shared run driver
//!
//! Walks any [`WorkerPool`] through dispatch, collection and teardown,
//! taking the draining path when the interrupt fires or collection fails.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::task::Task;

use super::{
    Collection, Execution, ExecutionState, ExecutionStats, Interrupt, ResultBuffer, StateTracker,
    WorkerPool,
};

pub(crate) fn drive<P: WorkerPool + ?Sized>(
    pool: &mut P,
    tasks: Vec<Task>,
    interrupt: &Interrupt,
) -> Result<Execution> {
    validate_tasks(&tasks)?;

    let mode = pool.mode();
    let settings = pool.settings().clone();
    let total = tasks.len();
    let mut state = StateTracker::new();

    let progress = Progress::new(total, mode, settings.workers, settings.verbose);
    let mut results = ResultBuffer::new(total, settings.transform.clone(), progress);

    debug!(%mode, workers = settings.workers, tasks = total, "Dispatching tasks");
    state.advance(ExecutionState::Dispatching)?;
    if let Err(e) = pool.dispatch(tasks) {
        warn!(%mode, error = %e, "Dispatch failed");
        pool.teardown();
        results.progress().abandon();
        return Err(e);
    }

    state.advance(ExecutionState::Collecting)?;
    let cancelled = match pool.collect(&mut results, interrupt) {
        Ok(Collection::Complete) => {
            pool.teardown();
            results.progress().finish();
            false
        }
        Ok(Collection::Interrupted) => {
            warn!(
                %mode,
                collected = results.stored(),
                total,
                "Interrupted, draining finished results"
            );
            state.advance(ExecutionState::Draining)?;
            let drained = pool.cancel(&mut results);
            pool.teardown();
            results.progress().abandon();
            drained?;
            true
        }
        Err(e) => {
            warn!(%mode, error = %e, "Collection failed, releasing workers");
            state.advance(ExecutionState::Draining)?;
            if let Err(cancel_error) = pool.cancel(&mut results) {
                warn!(error = %cancel_error, "Error while draining after failure");
            }
            pool.teardown();
            results.progress().abandon();
            return Err(e);
        }
    };
    state.advance(ExecutionState::Terminated)?;

    let results = results.into_slots();
    let stats = ExecutionStats::from_slots(mode, settings.workers, &results, state.elapsed());
    info!(
        %mode,
        total = stats.total,
        completed = stats.completed,
        failed = stats.failed,
        absent = stats.absent,
        cancelled,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Run finished"
    );

    Ok(Execution {
        results,
        cancelled,
        stats,
    })
}

/// Indices must be unique and address a slot in a buffer of `tasks.len()`
fn validate_tasks(tasks: &[Task]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if task.index() >= tasks.len() {
            return Err(Error::invalid_task_list(format!(
                "task index {} out of range for {} tasks",
                task.index(),
                tasks.len()
            )));
        }
        if !seen.insert(task.index()) {
            return Err(Error::invalid_task_list(format!(
                "duplicate task index {}",
                task.index()
            )));
        }
    }
    Ok(())
}
