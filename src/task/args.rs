//! Argument columns → task records
//!
//! Callers describe a batch as one value sequence per parameter name. Task
//! `i` receives the `i`-th value of every column. Columns of unequal
//! length are rejected, never truncated or padded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::{Arguments, Task};

/// Per-parameter value sequences for a batch of tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentColumns {
    columns: BTreeMap<String, Vec<Value>>,
}

impl ArgumentColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insert. Replaces an existing column of the same name.
    pub fn column<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.insert(name, values);
        self
    }

    pub fn insert<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.columns
            .insert(name.into(), values.into_iter().map(Into::into).collect());
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of tasks these columns describe.
    ///
    /// Zero for an empty mapping. Fails with [`Error::LengthMismatch`] when
    /// any column differs in length from the first.
    pub fn task_count(&self) -> Result<usize> {
        let mut columns = self.columns.iter();
        let Some((reference, first)) = columns.next() else {
            return Ok(0);
        };

        for (name, values) in columns {
            if values.len() != first.len() {
                return Err(Error::LengthMismatch {
                    parameter: name.clone(),
                    reference: reference.clone(),
                    expected: first.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(first.len())
    }

    /// Zip the columns into task records, index 0..n-1
    pub fn into_tasks(self) -> Result<Vec<Task>> {
        let count = self.task_count()?;
        let mut rows: Vec<Arguments> = (0..count).map(|_| Arguments::new()).collect();

        for (name, values) in self.columns {
            for (row, value) in rows.iter_mut().zip(values) {
                row.insert(name.clone(), value);
            }
        }

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(index, arguments)| Task::new(index, arguments))
            .collect())
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<Value>)> for ArgumentColumns {
    fn from_iter<I: IntoIterator<Item = (K, Vec<Value>)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zip_columns_into_tasks() {
        let tasks = ArgumentColumns::new()
            .column("a", [1, 2, 3])
            .column("b", ["x", "y", "z"])
            .into_tasks()
            .unwrap();

        assert_eq!(tasks.len(), 3);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.index(), i);
            assert_eq!(task.arguments().len(), 2);
        }
        assert_eq!(tasks[1].arguments().value("a"), Some(&json!(2)));
        assert_eq!(tasks[2].arguments().value("b"), Some(&json!("z")));
    }

    #[test]
    fn test_empty_mapping_yields_no_tasks() {
        assert!(ArgumentColumns::new().into_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_empty_columns_yield_no_tasks() {
        let columns = ArgumentColumns::new().column("a", Vec::<i32>::new());
        assert_eq!(columns.task_count().unwrap(), 0);
    }

    #[test]
    fn test_length_mismatch_is_detected() {
        let err = ArgumentColumns::new()
            .column("a", [1, 2, 3])
            .column("b", [1, 2])
            .into_tasks()
            .unwrap_err();

        match err {
            Error::LengthMismatch {
                parameter,
                reference,
                expected,
                actual,
            } => {
                assert_eq!(parameter, "b");
                assert_eq!(reference, "a");
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_column_replaces_same_name() {
        let columns = ArgumentColumns::new()
            .column("a", [1, 2, 3])
            .column("a", [9]);
        assert_eq!(columns.task_count().unwrap(), 1);
    }

    #[test]
    fn test_deserialize_from_json_object() {
        let columns: ArgumentColumns =
            serde_json::from_value(json!({"number": [0, 1, 2]})).unwrap();
        assert_eq!(columns.get("number").unwrap().len(), 3);
    }
}
