//! Task functions
//!
//! A [`TaskFunction`] declares its parameter names up front. Arguments are
//! bound strictly before the body runs, and a panicking body is contained
//! so it cannot take its worker down with it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{Arguments, TaskError, TaskOutcome};

/// Body signature shared by every task function
pub type TaskBody = dyn Fn(&Arguments) -> TaskOutcome + Send + Sync;

/// A named callable with a fixed set of parameters
#[derive(Clone)]
pub struct TaskFunction {
    name: String,
    parameters: Vec<String>,
    body: Arc<TaskBody>,
}

impl TaskFunction {
    pub fn new<F>(name: impl Into<String>, parameters: &[&str], body: F) -> Self
    where
        F: Fn(&Arguments) -> TaskOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Check that `arguments` names exactly the declared parameters
    pub fn bind(&self, arguments: &Arguments) -> Result<(), TaskError> {
        if let Some(unexpected) = arguments
            .names()
            .find(|name| !self.parameters.iter().any(|p| p == name))
        {
            return Err(TaskError::invalid_argument(format!(
                "{}() got an unexpected argument '{}'",
                self.name, unexpected
            )));
        }

        if let Some(missing) = self
            .parameters
            .iter()
            .find(|p| !arguments.contains(p.as_str()))
        {
            return Err(TaskError::invalid_argument(format!(
                "{}() missing required argument '{}'",
                self.name, missing
            )));
        }

        Ok(())
    }

    /// Bind and invoke. Never panics.
    pub fn call(&self, arguments: &Arguments) -> TaskOutcome {
        self.bind(arguments)?;

        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(arguments))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl fmt::Debug for TaskFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
