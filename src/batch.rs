//! Batch helpers
//!
//! Splitting work into a few coarse batches amortizes per-task overhead,
//! which matters most in process mode where every task crosses a pipe.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::executor::ResultSlot;
use crate::task::ArgumentColumns;

/// Sizes of `n` near-equal batches over `len` items, larger batches first.
/// Never yields an empty batch.
fn batch_sizes(len: usize, n: usize) -> Result<Vec<usize>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if n == 0 {
        return Err(Error::InvalidBatchCount(n));
    }

    let count = n.min(len);

    let base = len / count;
    let extra = len % count;
    Ok((0..count).map(|i| base + usize::from(i < extra)).collect())
}

/// Split `data` into at most `n` contiguous batches whose sizes differ by at
/// most one.
pub fn create_batches<T: Clone>(data: &[T], n: usize) -> Result<Vec<Vec<T>>> {
    let mut rest = data;
    let batches = batch_sizes(data.len(), n)?
        .into_iter()
        .map(|size| {
            let (head, tail) = rest.split_at(size);
            rest = tail;
            head.to_vec()
        })
        .collect();
    Ok(batches)
}

/// Concatenate per-batch results, skipping batches that produced nothing
pub fn flatten_results<T, I>(batches: I) -> Vec<T>
where
    I: IntoIterator<Item = Option<Vec<T>>>,
{
    batches.into_iter().flatten().flatten().collect()
}

/// Batch every column the same way, so that task `i` of the result receives
/// batch `i` of each original column as one array argument.
pub fn batch_columns(columns: &ArgumentColumns, n: usize) -> Result<ArgumentColumns> {
    let sizes = batch_sizes(columns.task_count()?, n)?;

    let batched = columns
        .iter()
        .map(|(name, values)| {
            let mut rest = values;
            let column: Vec<Value> = sizes
                .iter()
                .map(|&size| {
                    let (head, tail) = rest.split_at(size);
                    rest = tail;
                    Value::Array(head.to_vec())
                })
                .collect();
            (name.to_string(), column)
        })
        .collect();

    Ok(batched)
}

/// Concatenate the array values of ready slots in order. Absent and failed
/// slots are skipped; a ready non-array value is kept as a single item.
pub fn flatten_slots(slots: &[ResultSlot]) -> Vec<Value> {
    let batches = slots.iter().map(|slot| match slot.value() {
        Some(Value::Array(items)) => Some(items.clone()),
        Some(other) => Some(vec![other.clone()]),
        None => None,
    });
    flatten_results(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskError;
    use serde_json::json;

    #[test]
    fn test_even_split() {
        let batches = create_batches(&[1, 2, 3, 4, 5, 6], 3).unwrap();
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_uneven_split_front_loads() {
        let batches = create_batches(&(0..10).collect::<Vec<_>>(), 4).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(batches.concat(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_more_batches_than_items() {
        let batches = create_batches(&["a", "b"], 5).unwrap();
        assert_eq!(batches, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_empty_input() {
        let batches = create_batches::<u8>(&[], 3).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_zero_batches_rejected() {
        let err = create_batches(&[1], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidBatchCount(0)));
    }

    #[test]
    fn test_flatten_skips_missing_batches() {
        let flat = flatten_results(vec![Some(vec![1, 2]), None, Some(vec![3])]);
        assert_eq!(flat, vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_columns() {
        let columns = ArgumentColumns::new()
            .column("x", [1, 2, 3, 4, 5])
            .column("y", ["a", "b", "c", "d", "e"]);

        let batched = batch_columns(&columns, 2).unwrap();
        assert_eq!(batched.task_count().unwrap(), 2);
        assert_eq!(
            batched.get("x").unwrap(),
            &[json!([1, 2, 3]), json!([4, 5])]
        );
        assert_eq!(
            batched.get("y").unwrap(),
            &[json!(["a", "b", "c"]), json!(["d", "e"])]
        );
    }

    #[test]
    fn test_batch_columns_length_mismatch() {
        let columns = ArgumentColumns::new()
            .column("x", [1, 2])
            .column("y", [1]);
        assert!(matches!(
            batch_columns(&columns, 2),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_flatten_slots() {
        let slots = vec![
            ResultSlot::Ready(json!([1, 4])),
            ResultSlot::Absent,
            ResultSlot::Failed(TaskError::failed("boom")),
            ResultSlot::Ready(json!([9])),
            ResultSlot::Ready(json!(16)),
        ];
        assert_eq!(
            flatten_slots(&slots),
            vec![json!(1), json!(4), json!(9), json!(16)]
        );
    }
}
