//! Tasks: one function invocation with one bound set of named arguments
//!
//! - [`Task`]: index + arguments, the unit a worker executes
//! - [`Arguments`]: parameter name → JSON value
//! - [`TaskFunction`]: named, parameter-checked, panic-safe callable
//! - [`ArgumentColumns`]: per-parameter value columns, zipped into tasks
//! - [`TaskRegistry`]: name → function lookup for worker processes

mod args;
mod function;
mod registry;

pub use args::ArgumentColumns;
pub use function::{TaskBody, TaskFunction};
pub use registry::TaskRegistry;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Outcome of a single task invocation
pub type TaskOutcome = std::result::Result<Value, TaskError>;

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// One unit of work. The index is the task's submission position and the
/// only key results are ordered by.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    index: usize,
    arguments: Arguments,
}

impl Task {
    pub fn new(index: usize, arguments: Arguments) -> Self {
        Self { index, arguments }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn into_arguments(self) -> Arguments {
        self.arguments
    }
}

// ─────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────

/// Named arguments bound to a single task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Raw value of an argument
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Typed access to an argument.
    ///
    /// A missing argument or a value of the wrong shape is an
    /// [`TaskError::InvalidArgument`].
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<T, TaskError> {
        let value = self.0.get(name).ok_or_else(|| {
            TaskError::invalid_argument(format!("missing required argument '{}'", name))
        })?;
        T::deserialize(value)
            .map_err(|e| TaskError::invalid_argument(format!("argument '{}': {}", name, e)))
    }

    /// Typed access to an optional argument
    pub fn get_or<T: DeserializeOwned>(
        &self,
        name: &str,
        default: T,
    ) -> std::result::Result<T, TaskError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.get(name),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Errors
// ─────────────────────────────────────────────────────────────────

/// Failure of a single task. Recorded in that task's result slot; never
/// aborts sibling tasks.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// The function rejected the arguments bound to it
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The function ran and returned an error
    #[error("task failed: {message}")]
    Failed { message: String },

    /// The function panicked
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// The worker process has no function with this name
    #[error("unknown task function: {name}")]
    UnknownFunction { name: String },

    /// The worker process died while running the task
    #[error("worker crashed: {message}")]
    WorkerCrash { message: String },
}

impl TaskError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        TaskError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
        }
    }

    pub fn worker_crash(message: impl Into<String>) -> Self {
        TaskError::WorkerCrash {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, as used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::InvalidArgument { .. } => "invalid_argument",
            TaskError::Failed { .. } => "failed",
            TaskError::Panicked { .. } => "panicked",
            TaskError::UnknownFunction { .. } => "unknown_function",
            TaskError::WorkerCrash { .. } => "worker_crash",
        }
    }
}
