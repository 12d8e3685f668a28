//! Thread pool coordinator
//!
//! One shared FIFO task queue feeds `workers` threads; one shared event
//! queue carries results back to the coordinating thread. Shutdown is
//! sentinel based: after the tasks, exactly one [`WorkItem::Stop`] per
//! worker is queued. Each worker consumes exactly one stop before exiting,
//! so queuing fewer stops than workers leaves a worker blocked forever.
//!
//! Cancellation is cooperative. Threads cannot be killed; a worker only
//! notices the stop flag between tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::task::{Task, TaskFunction, TaskOutcome};

use super::{Collection, CoordinatorSettings, ExecutionMode, Interrupt, ResultBuffer, WorkerPool};

/// Task queue item
enum WorkItem {
    Run(Task),
    Stop,
}

/// Result queue item
enum WorkerEvent {
    Finished { index: usize, outcome: TaskOutcome },
    Exited { worker: usize, processed: usize },
}

// ─────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────

/// Runs a [`TaskFunction`] on a fresh set of OS threads per run
pub struct ThreadPoolCoordinator {
    function: TaskFunction,
    settings: CoordinatorSettings,
    run: Option<ThreadRun>,
}

impl ThreadPoolCoordinator {
    pub fn new(function: TaskFunction, settings: CoordinatorSettings) -> Self {
        Self {
            function,
            settings,
            run: None,
        }
    }

    pub fn function(&self) -> &TaskFunction {
        &self.function
    }

    fn active_run(&mut self) -> Result<&mut ThreadRun> {
        self.run
            .as_mut()
            .ok_or_else(|| Error::Internal("thread pool used before dispatch".to_string()))
    }
}

impl WorkerPool for ThreadPoolCoordinator {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Threads
    }

    fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    fn dispatch(&mut self, tasks: Vec<Task>) -> Result<()> {
        self.teardown();

        let workers = self.settings.workers;
        let (task_tx, task_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let run = self.run.insert(ThreadRun {
            task_tx,
            task_rx,
            events: event_rx,
            stop,
            handles: Vec::with_capacity(workers),
            exited: 0,
        });

        for worker in 0..workers {
            let context = WorkerContext {
                id: worker,
                function: self.function.clone(),
                tasks: run.task_rx.clone(),
                events: event_tx.clone(),
                stop: Arc::clone(&run.stop),
            };
            let handle = thread::Builder::new()
                .name(format!("parallelizer-worker-{}", worker))
                .spawn(move || context.run())?;
            run.handles.push(handle);
        }
        // Only workers hold senders now; the queue disconnects once all exit.
        drop(event_tx);

        let count = tasks.len();
        for task in tasks {
            run.send(WorkItem::Run(task))?;
        }
        for _ in 0..workers {
            run.send(WorkItem::Stop)?;
        }

        debug!(workers, tasks = count, "Thread workers started");
        Ok(())
    }

    fn collect(&mut self, results: &mut ResultBuffer, interrupt: &Interrupt) -> Result<Collection> {
        let poll_interval = self.settings.poll_interval;
        let run = self.active_run()?;

        while run.exited < run.handles.len() {
            if interrupt.is_triggered() {
                return Ok(Collection::Interrupted);
            }

            match run.events.recv_timeout(poll_interval) {
                Ok(event) => run.record(event, results)?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(
                        exited = run.exited,
                        workers = run.handles.len(),
                        "Result queue closed before every worker reported"
                    );
                    break;
                }
            }
        }

        Ok(Collection::Complete)
    }

    fn cancel(&mut self, results: &mut ResultBuffer) -> Result<()> {
        let Some(mut run) = self.run.take() else {
            return Ok(());
        };

        run.stop.store(true, Ordering::SeqCst);
        let ready = run.drain_events(results);
        run.release();
        // tasks that were mid-flight finished while we joined
        let late = run.drain_events(results);

        ready.and(late)
    }

    fn teardown(&mut self) {
        if let Some(mut run) = self.run.take() {
            run.release();
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Per-run State
// ─────────────────────────────────────────────────────────────────

/// Queues, stop flag and thread handles owned by one run
struct ThreadRun {
    task_tx: Sender<WorkItem>,
    /// Kept so the coordinator can pull unconsumed tasks back out
    task_rx: Receiver<WorkItem>,
    events: Receiver<WorkerEvent>,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    exited: usize,
}

impl ThreadRun {
    fn send(&self, item: WorkItem) -> Result<()> {
        self.task_tx.send(item).map_err(|_| Error::PoolClosed)
    }

    fn record(&mut self, event: WorkerEvent, results: &mut ResultBuffer) -> Result<()> {
        match event {
            WorkerEvent::Finished { index, outcome } => results.store(index, outcome),
            WorkerEvent::Exited { worker, processed } => {
                self.exited += 1;
                trace!(worker, processed, "Worker thread exited");
                Ok(())
            }
        }
    }

    /// Store everything already sitting in the result queue without
    /// blocking. Keeps going past a failed store and reports the first error.
    fn drain_events(&mut self, results: &mut ResultBuffer) -> Result<()> {
        let mut first_error = None;
        while let Ok(event) = self.events.try_recv() {
            if let Err(e) = self.record(event, results) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stop every worker and join it. Idempotent.
    fn release(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.stop.store(true, Ordering::SeqCst);

        let mut discarded = 0;
        while let Ok(item) = self.task_rx.try_recv() {
            if matches!(item, WorkItem::Run(_)) {
                discarded += 1;
            }
        }
        // Fresh stops: the drain above may have removed the original ones.
        for _ in 0..self.handles.len() {
            let _ = self.task_tx.send(WorkItem::Stop);
        }
        if discarded > 0 {
            debug!(discarded, "Discarded undispatched tasks");
        }

        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for ThreadRun {
    fn drop(&mut self) {
        self.release();
    }
}

// ─────────────────────────────────────────────────────────────────
// Worker Loop
// ─────────────────────────────────────────────────────────────────

struct WorkerContext {
    id: usize,
    function: TaskFunction,
    tasks: Receiver<WorkItem>,
    events: Sender<WorkerEvent>,
    stop: Arc<AtomicBool>,
}

impl WorkerContext {
    fn run(self) {
        let mut processed = 0;

        while let Ok(item) = self.tasks.recv() {
            let task = match item {
                WorkItem::Run(task) => task,
                WorkItem::Stop => break,
            };
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            let outcome = self.function.call(task.arguments());
            processed += 1;
            let event = WorkerEvent::Finished {
                index: task.index(),
                outcome,
            };
            if self.events.send(event).is_err() {
                break;
            }
        }

        let _ = self.events.send(WorkerEvent::Exited {
            worker: self.id,
            processed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ResultSlot;
    use crate::task::ArgumentColumns;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn square() -> TaskFunction {
        TaskFunction::new("square", &["number"], |args| {
            let n: i64 = args.get("number")?;
            Ok(json!(n * n))
        })
    }

    fn coordinator(function: TaskFunction, workers: usize) -> ThreadPoolCoordinator {
        let settings = CoordinatorSettings::new(Some(workers))
            .unwrap()
            .with_verbose(false)
            .with_poll_interval(Duration::from_millis(10));
        ThreadPoolCoordinator::new(function, settings)
    }

    fn tasks(numbers: impl IntoIterator<Item = i64>) -> Vec<Task> {
        ArgumentColumns::new()
            .column("number", numbers)
            .into_tasks()
            .unwrap()
    }

    #[test]
    fn test_squares_in_order() {
        let execution = coordinator(square(), 5)
            .execute(tasks(0..5), &Interrupt::new())
            .unwrap();
        let values: Vec<_> = execution.results.iter().map(|s| s.value().cloned()).collect();
        assert_eq!(
            values,
            vec![Some(json!(0)), Some(json!(1)), Some(json!(4)), Some(json!(9)), Some(json!(16))]
        );
        assert!(!execution.cancelled);
    }

    #[test]
    fn test_more_workers_than_tasks() {
        let execution = coordinator(square(), 8)
            .execute(tasks([3]), &Interrupt::new())
            .unwrap();
        assert_eq!(execution.results, vec![ResultSlot::Ready(json!(9))]);
    }

    #[test]
    fn test_zero_tasks_does_not_block() {
        let execution = coordinator(square(), 4)
            .execute(Vec::new(), &Interrupt::new())
            .unwrap();
        assert!(execution.results.is_empty());
        assert!(!execution.cancelled);
    }

    #[test]
    fn test_pre_triggered_interrupt_cancels() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let started = Instant::now();
        let execution = coordinator(square(), 2)
            .execute(tasks(0..100), &interrupt)
            .unwrap();
        assert!(execution.cancelled);
        assert_eq!(execution.results.len(), 100);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_coordinator_reused_across_runs() {
        let mut pool = coordinator(square(), 3);

        let first = pool.execute(tasks(0..4), &Interrupt::new()).unwrap();
        let second = pool.execute(tasks(4..9), &Interrupt::new()).unwrap();

        assert!(!first.cancelled);
        assert!(!second.cancelled);
        assert_eq!(
            first.results,
            [0, 1, 4, 9].into_iter().map(|n| ResultSlot::Ready(json!(n))).collect::<Vec<_>>()
        );
        assert_eq!(
            second.results,
            [16, 25, 36, 49, 64].into_iter().map(|n| ResultSlot::Ready(json!(n))).collect::<Vec<_>>()
        );
        assert!(pool.run.is_none());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut pool = coordinator(square(), 2);
        pool.dispatch(tasks(0..3)).unwrap();
        pool.teardown();
        pool.teardown();
        assert!(pool.run.is_none());
    }

    #[test]
    fn test_cancel_without_run_is_noop() {
        let mut pool = coordinator(square(), 2);
        let mut results = ResultBuffer::new(0, None, crate::progress::Progress::disabled());
        assert!(pool.cancel(&mut results).is_ok());
    }
}
