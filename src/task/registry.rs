//! Task function registry
//!
//! Process-mode workers receive a function *name* over the wire and look
//! it up here; both sides of the pipe must register the same functions.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::TaskFunction;

/// Name → task function lookup
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    functions: HashMap<String, TaskFunction>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, function: TaskFunction) -> &mut Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TaskFunction> {
        self.functions.get(name)
    }

    /// Look up a function, failing with [`Error::UnknownFunction`]
    pub fn require(&self, name: &str) -> Result<&TaskFunction> {
        self.get(name).ok_or_else(|| Error::unknown_function(name))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FromIterator<TaskFunction> for TaskRegistry {
    fn from_iter<I: IntoIterator<Item = TaskFunction>>(iter: I) -> Self {
        let mut registry = Self::new();
        for function in iter {
            registry.register(function);
        }
        registry
    }
}
