//! Ordered result accumulation
//!
//! The buffer is pre-sized to the task count and written only from the
//! coordinating thread, so it needs no lock. Slot `i` only ever holds the
//! (possibly transformed) output of task `i`.

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::task::{TaskError, TaskOutcome};

use super::ExecutionStats;

/// Callback applied to each successful value as `(index, value)`.
///
/// Runs on the coordinating thread; an error aborts the run.
pub type ResultTransform = Arc<dyn Fn(usize, Value) -> anyhow::Result<Value> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────
// Result Slot
// ─────────────────────────────────────────────────────────────────

/// One position in the ordered result list
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultSlot {
    /// Never ran, or never finished before cancellation
    #[default]
    Absent,
    /// Ran and produced a value
    Ready(Value),
    /// Ran and failed
    Failed(TaskError),
}

impl ResultSlot {
    pub fn is_absent(&self) -> bool {
        matches!(self, ResultSlot::Absent)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResultSlot::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResultSlot::Failed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ResultSlot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            ResultSlot::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ResultSlot::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// `null` / value / `{"error": {...}}`
impl Serialize for ResultSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ResultSlot::Absent => serializer.serialize_none(),
            ResultSlot::Ready(value) => value.serialize(serializer),
            ResultSlot::Failed(error) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Result Buffer
// ─────────────────────────────────────────────────────────────────

/// Pre-sized, index-addressed result store for one run
pub struct ResultBuffer {
    slots: Vec<ResultSlot>,
    transform: Option<ResultTransform>,
    progress: Progress,
    stored: usize,
}

impl ResultBuffer {
    pub fn new(len: usize, transform: Option<ResultTransform>, progress: Progress) -> Self {
        Self {
            slots: vec![ResultSlot::Absent; len],
            transform,
            progress,
            stored: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots filled so far
    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn slots(&self) -> &[ResultSlot] {
        &self.slots
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Record the outcome of task `index`, applying the transform to
    /// successful values and advancing progress by one.
    ///
    /// A second outcome for the same index is ignored.
    pub fn store(&mut self, index: usize, outcome: TaskOutcome) -> Result<()> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            Error::Internal(format!("result index {} out of range for {} tasks", index, len))
        })?;

        if !slot.is_absent() {
            warn!(index, "Duplicate result ignored");
            return Ok(());
        }

        *slot = match outcome {
            Ok(value) => match &self.transform {
                Some(transform) => {
                    let value = transform(index, value).map_err(|e| Error::Transform {
                        index,
                        message: format!("{:#}", e),
                    })?;
                    ResultSlot::Ready(value)
                }
                None => ResultSlot::Ready(value),
            },
            Err(error) => {
                debug!(index, kind = error.kind(), error = %error, "Task failed");
                ResultSlot::Failed(error)
            }
        };

        self.stored += 1;
        self.progress.advance();
        Ok(())
    }

    pub fn into_slots(self) -> Vec<ResultSlot> {
        self.slots
    }
}

impl fmt::Debug for ResultBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBuffer")
            .field("len", &self.slots.len())
            .field("stored", &self.stored)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────

/// Outcome of one run: results in submission order plus the
/// cancellation flag
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub results: Vec<ResultSlot>,
    pub cancelled: bool,
    #[serde(skip)]
    pub stats: ExecutionStats,
}

impl Execution {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Successful values in order, `None` for absent and failed slots
    pub fn values(&self) -> Vec<Option<&Value>> {
        self.results.iter().map(ResultSlot::value).collect()
    }

    /// `(results, was_cancelled)`
    pub fn into_parts(self) -> (Vec<ResultSlot>, bool) {
        (self.results, self.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn buffer(len: usize, transform: Option<ResultTransform>) -> ResultBuffer {
        ResultBuffer::new(len, transform, Progress::disabled())
    }

    #[test]
    fn test_store_in_any_order() {
        let mut results = buffer(3, None);
        results.store(2, Ok(json!("c"))).unwrap();
        results.store(0, Ok(json!("a"))).unwrap();

        assert_eq!(results.stored(), 2);
        assert_eq!(
            results.into_slots(),
            vec![ResultSlot::Ready(json!("a")), ResultSlot::Absent, ResultSlot::Ready(json!("c"))]
        );
    }

    #[test]
    fn test_failed_slot_is_not_absent() {
        let mut results = buffer(1, None);
        results.store(0, Err(TaskError::failed("nope"))).unwrap();
        let slot = &results.slots()[0];
        assert!(slot.is_failed());
        assert!(!slot.is_absent());
        assert_eq!(slot.error().unwrap().kind(), "failed");
    }

    #[test]
    fn test_transform_receives_index_and_value() {
        let transform: ResultTransform = Arc::new(|index: usize, value: Value| -> anyhow::Result<Value> {
            Ok(json!([index, value.as_i64().unwrap_or(0) + 1]))
        });
        let mut results = buffer(2, Some(transform));
        results.store(1, Ok(json!(9))).unwrap();
        assert_eq!(results.slots()[1], ResultSlot::Ready(json!([1, 10])));
    }

    #[test]
    fn test_transform_skipped_for_failures() {
        let transform: ResultTransform = Arc::new(|_: usize, _: Value| -> anyhow::Result<Value> {
            anyhow::bail!("should not run")
        });
        let mut results = buffer(1, Some(transform));
        results.store(0, Err(TaskError::failed("x"))).unwrap();
        assert!(results.slots()[0].is_failed());
    }

    #[test]
    fn test_transform_error_propagates() {
        let transform: ResultTransform = Arc::new(|_: usize, _: Value| -> anyhow::Result<Value> {
            anyhow::bail!("bad value")
        });
        let mut results = buffer(1, Some(transform));
        let err = results.store(0, Ok(json!(1))).unwrap_err();
        assert!(matches!(err, Error::Transform { index: 0, .. }));
        assert!(results.slots()[0].is_absent());
        assert_eq!(results.stored(), 0);
    }

    #[test]
    fn test_duplicate_ignored() {
        let mut results = buffer(1, None);
        results.store(0, Ok(json!(1))).unwrap();
        results.store(0, Ok(json!(2))).unwrap();
        assert_eq!(results.slots()[0], ResultSlot::Ready(json!(1)));
        assert_eq!(results.stored(), 1);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut results = buffer(1, None);
        assert!(matches!(results.store(5, Ok(json!(1))), Err(Error::Internal(_))));
    }

    #[test]
    fn test_slot_serialization() {
        let slots = vec![
            ResultSlot::Ready(json!(4)),
            ResultSlot::Absent,
            ResultSlot::Failed(TaskError::failed("boom")),
        ];
        assert_eq!(
            serde_json::to_value(&slots).unwrap(),
            json!([4, null, {"error": {"kind": "failed", "message": "boom"}}])
        );
    }
}
