//! Ordered worker pools over threads or processes
//!
//! A [`Parallelizer`] runs one [`TaskFunction`] per row of an
//! [`ArgumentColumns`] table and returns every result in row order, along
//! with whether the run was cut short. Cancelling through an [`Interrupt`]
//! keeps whatever finished before the cut.

pub mod batch;
pub mod builtins;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod parallelizer;
pub mod process;
pub mod progress;
pub mod task;
pub mod version;

pub use crate::batch::{batch_columns, create_batches, flatten_results, flatten_slots};
pub use crate::config::ParallelizerConfig;
pub use crate::error::{Error, ErrorCode, Result};
pub use crate::executor::{Execution, ExecutionMode, ExecutionStats, Interrupt, ResultSlot};
pub use crate::parallelizer::Parallelizer;
pub use crate::process::WorkerCommand;
pub use crate::task::{ArgumentColumns, Arguments, TaskError, TaskFunction, TaskOutcome, TaskRegistry};
