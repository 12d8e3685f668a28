//! Run lifecycle state tracking

use std::fmt;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Error, Result};

use super::{ExecutionMode, ResultSlot};

// ─────────────────────────────────────────────────────────────────
// Execution State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle of one coordinator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    /// Nothing started
    #[default]
    Idle,
    /// Workers starting, tasks being handed out
    Dispatching,
    /// Results being gathered in readiness order
    Collecting,
    /// Interrupted: finished results being saved before workers are released
    Draining,
    /// All workers released
    Terminated,
}

impl ExecutionState {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Dispatching => "dispatching",
            ExecutionState::Collecting => "collecting",
            ExecutionState::Draining => "draining",
            ExecutionState::Terminated => "terminated",
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Idle, Dispatching)
                | (Dispatching, Collecting)
                | (Dispatching, Draining)
                | (Dispatching, Terminated)
                | (Collecting, Terminated)
                | (Collecting, Draining)
                | (Draining, Terminated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Terminated)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enforces the lifecycle ordering for one run
#[derive(Debug)]
pub struct StateTracker {
    state: ExecutionState,
    entered_at: Instant,
    started_at: Instant,
}

impl StateTracker {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: ExecutionState::Idle,
            entered_at: now,
            started_at: now,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: ExecutionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal execution state transition {} -> {}",
                self.state, next
            )));
        }

        trace!(
            from = %self.state,
            to = %next,
            after_ms = self.entered_at.elapsed().as_millis() as u64,
            "Execution state changed"
        );
        self.state = next;
        self.entered_at = Instant::now();
        Ok(())
    }

    /// Time since the tracker was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Execution Statistics
// ─────────────────────────────────────────────────────────────────

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    pub mode: ExecutionMode,
    pub workers: usize,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub absent: usize,
    pub elapsed: Duration,
}

impl ExecutionStats {
    pub fn from_slots(
        mode: ExecutionMode,
        workers: usize,
        slots: &[ResultSlot],
        elapsed: Duration,
    ) -> Self {
        let mut stats = Self {
            mode,
            workers,
            total: slots.len(),
            elapsed,
            ..Self::default()
        };

        for slot in slots {
            match slot {
                ResultSlot::Ready(_) => stats.completed += 1,
                ResultSlot::Failed(_) => stats.failed += 1,
                ResultSlot::Absent => stats.absent += 1,
            }
        }

        stats
    }
}
