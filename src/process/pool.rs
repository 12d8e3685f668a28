//! Fixed-size pool of worker processes
//!
//! Each child gets a feeder thread in the parent that owns the child's
//! pipes. Feeders pull jobs from one shared queue, so a child never has
//! more than one job in flight. A child that dies mid-job fails only that
//! job and is replaced before the feeder takes the next one.

use std::ffi::OsString;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::task::{TaskError, TaskOutcome};

use super::protocol::{self, JobReply, JobRequest};

type ChildSlot = Arc<Mutex<Option<Child>>>;

// ─────────────────────────────────────────────────────────────────
// Worker Command
// ─────────────────────────────────────────────────────────────────

/// Program and arguments that start one worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// This executable, invoked as `<exe> worker`
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, ["worker"]))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn spawn(&self) -> Result<(Child, ChildIo)> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::WorkerSpawn {
                program: self.program.display().to_string(),
                source,
            })?;

        match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Ok((
                child,
                ChildIo {
                    stdin,
                    stdout: BufReader::new(stdout),
                },
            )),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::Internal("worker process started without pipes".to_string()))
            }
        }
    }
}

struct ChildIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

// ─────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────

struct Job {
    request: JobRequest,
    reply: Sender<TaskOutcome>,
}

/// Pending result of one submitted job
#[derive(Debug)]
pub struct JobHandle {
    index: usize,
    reply: Receiver<TaskOutcome>,
}

impl JobHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// The outcome if the job has finished, without blocking.
    ///
    /// Yields a value at most once; a job whose worker vanished without
    /// replying reports [`TaskError::WorkerCrash`].
    pub fn try_take(&self) -> Option<TaskOutcome> {
        match self.reply.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(lost_reply())),
        }
    }

    /// The reply if the worker delivered one, without blocking. A job whose
    /// worker vanished without replying yields `None`.
    pub fn try_take_reply(&self) -> Option<TaskOutcome> {
        self.reply.try_recv().ok()
    }

    /// Block until the job finishes
    pub fn wait(self) -> TaskOutcome {
        self.reply.recv().unwrap_or_else(|_| Err(lost_reply()))
    }
}

fn lost_reply() -> TaskError {
    TaskError::worker_crash("worker stopped before replying")
}

// ─────────────────────────────────────────────────────────────────
// Process Pool
// ─────────────────────────────────────────────────────────────────

/// A fixed number of worker processes fed from one job queue
pub struct ProcessPool {
    jobs: Option<Sender<Job>>,
    feeders: Vec<JoinHandle<()>>,
    children: Vec<ChildSlot>,
    terminated: Arc<AtomicBool>,
    size: usize,
}

impl ProcessPool {
    /// Start `size` worker processes.
    ///
    /// If any of them fails to start, the ones already running are killed
    /// and the spawn error is returned.
    pub fn spawn(command: &WorkerCommand, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidWorkerCount(0));
        }

        let (job_tx, job_rx) = channel::unbounded();
        let mut pool = Self {
            jobs: Some(job_tx),
            feeders: Vec::with_capacity(size),
            children: Vec::with_capacity(size),
            terminated: Arc::new(AtomicBool::new(false)),
            size,
        };

        for id in 0..size {
            if let Err(e) = pool.start_feeder(id, command, &job_rx) {
                pool.terminate();
                pool.join();
                return Err(e);
            }
        }

        debug!(
            workers = size,
            program = %command.program().display(),
            "Worker processes started"
        );
        Ok(pool)
    }

    fn start_feeder(&mut self, id: usize, command: &WorkerCommand, jobs: &Receiver<Job>) -> Result<()> {
        let (child, io) = command.spawn()?;
        trace!(worker = id, pid = child.id(), "Worker process spawned");

        let slot: ChildSlot = Arc::new(Mutex::new(Some(child)));
        self.children.push(Arc::clone(&slot));

        let feeder = Feeder {
            id,
            command: command.clone(),
            jobs: jobs.clone(),
            slot,
            io: Some(io),
            terminated: Arc::clone(&self.terminated),
        };
        let handle = thread::Builder::new()
            .name(format!("parallelizer-feeder-{}", id))
            .spawn(move || feeder.run())?;
        self.feeders.push(handle);
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Queue a job without waiting for it
    pub fn apply_async(&self, request: JobRequest) -> Result<JobHandle> {
        let jobs = self.jobs.as_ref().ok_or(Error::PoolClosed)?;
        let (reply_tx, reply_rx) = channel::bounded(1);
        let index = request.index;

        jobs.send(Job {
            request,
            reply: reply_tx,
        })
        .map_err(|_| Error::PoolClosed)?;

        Ok(JobHandle {
            index,
            reply: reply_rx,
        })
    }

    /// Stop accepting jobs. Workers finish the queue, then exit.
    pub fn close(&mut self) {
        self.jobs = None;
    }

    /// Stop accepting jobs and kill every worker process now. Queued and
    /// running jobs are abandoned.
    pub fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.jobs = None;

        for slot in &self.children {
            if let Some(child) = slot.lock().as_mut() {
                if let Err(e) = child.kill() {
                    debug!(pid = child.id(), error = %e, "Worker process already gone");
                }
            }
        }
    }

    /// Wait for every feeder to finish and reap its process. Idempotent.
    pub fn join(&mut self) {
        for handle in self.feeders.drain(..) {
            if handle.join().is_err() {
                warn!("Feeder thread panicked");
            }
        }
        self.children.clear();
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        if !self.feeders.is_empty() {
            self.terminate();
            self.join();
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Feeder
// ─────────────────────────────────────────────────────────────────

/// Parent-side thread driving one worker process
struct Feeder {
    id: usize,
    command: WorkerCommand,
    jobs: Receiver<Job>,
    slot: ChildSlot,
    io: Option<ChildIo>,
    terminated: Arc<AtomicBool>,
}

impl Feeder {
    fn run(mut self) {
        let mut served = 0usize;

        while let Ok(Job { request, reply }) = self.jobs.recv() {
            if self.is_terminated() {
                break;
            }

            let outcome = match self.round_trip(&request) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if self.is_terminated() {
                        break;
                    }
                    let message = match self.reap(true) {
                        Some(status) => format!("{} (worker exited: {})", e, status),
                        None => e.to_string(),
                    };
                    warn!(
                        worker = self.id,
                        index = request.index,
                        error = %message,
                        "Worker process failed, replacing it"
                    );
                    Err(TaskError::worker_crash(message))
                }
            };

            served += 1;
            let _ = reply.send(outcome);
        }

        let kill = self.is_terminated();
        self.reap(kill);
        trace!(worker = self.id, served, "Feeder exited");
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn round_trip(&mut self, request: &JobRequest) -> Result<TaskOutcome> {
        if self.io.is_none() {
            self.respawn()?;
        }
        let io = self.io.as_mut().ok_or(Error::PoolClosed)?;

        protocol::write_message(&mut io.stdin, request)?;
        let reply: JobReply = protocol::read_message(&mut io.stdout)?
            .ok_or_else(|| Error::protocol("worker process closed its output"))?;

        if reply.index != request.index {
            return Err(Error::protocol(format!(
                "reply for task {} while waiting for task {}",
                reply.index, request.index
            )));
        }
        Ok(reply.outcome.into())
    }

    fn respawn(&mut self) -> Result<()> {
        let (child, io) = self.command.spawn()?;
        debug!(worker = self.id, pid = child.id(), "Replacement worker process spawned");
        *self.slot.lock() = Some(child);

        // terminate() may have swept the slots before the new child landed
        if self.is_terminated() {
            self.reap(true);
            return Err(Error::PoolClosed);
        }

        self.io = Some(io);
        Ok(())
    }

    /// Close the pipes and wait for the process, killing it first if asked
    fn reap(&mut self, kill: bool) -> Option<ExitStatus> {
        self.io = None;
        let mut child = self.slot.lock().take()?;
        if kill {
            let _ = child.kill();
        }
        match child.wait() {
            Ok(status) => {
                trace!(worker = self.id, %status, "Worker process reaped");
                Some(status)
            }
            Err(e) => {
                warn!(worker = self.id, error = %e, "Failed to reap worker process");
                None
            }
        }
    }
}
