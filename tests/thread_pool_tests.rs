//! Thread-mode integration tests
//!
//! Drive the public API end to end on OS threads.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use common::builtin;
use parallelizer::{
    ArgumentColumns, Error, Interrupt, Parallelizer, ResultSlot, TaskError, TaskFunction,
};

fn quiet(function: TaskFunction) -> Parallelizer {
    Parallelizer::new(function).verbose(false)
}

fn ready(values: impl IntoIterator<Item = Value>) -> Vec<ResultSlot> {
    values.into_iter().map(ResultSlot::Ready).collect()
}

// ─────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_squares_in_argument_order() {
    let execution = quiet(builtin("square"))
        .workers(5)
        .run_threaded(ArgumentColumns::new().column("number", 0..5))
        .unwrap();

    let (results, cancelled) = execution.into_parts();
    assert!(!cancelled);
    assert_eq!(results, ready([json!(0), json!(1), json!(4), json!(9), json!(16)]));
}

#[test]
fn test_staggered_delays_keep_order() {
    // Early tasks sleep longest, so they finish last
    let columns = ArgumentColumns::new()
        .column("number", 0..6)
        .column("sleep", [0.3, 0.25, 0.2, 0.15, 0.1, 0.0]);

    let execution = quiet(builtin("sleep_square"))
        .workers(6)
        .run_threaded(columns)
        .unwrap();

    assert!(!execution.cancelled);
    assert_eq!(
        execution.results,
        ready([json!(0), json!(1), json!(4), json!(9), json!(16), json!(25)])
    );
}

#[test]
fn test_single_worker_matches_many() {
    let columns = || ArgumentColumns::new().column("a", 0..40).column("b", 100..140);

    let one = quiet(builtin("add")).workers(1).run_threaded(columns()).unwrap();
    let many = quiet(builtin("add")).workers(8).run_threaded(columns()).unwrap();

    assert_eq!(one.results, many.results);
    assert_eq!(one.results[39], ResultSlot::Ready(json!(178)));
}

#[test]
fn test_transform_sees_index_and_value() {
    let execution = quiet(builtin("square"))
        .workers(2)
        .transform(|index, value| Ok(json!({"index": index, "square": value})))
        .run_threaded(ArgumentColumns::new().column("number", [3, 4]))
        .unwrap();

    assert_eq!(
        execution.results,
        ready([json!({"index": 0, "square": 9}), json!({"index": 1, "square": 16})])
    );
}

#[test]
fn test_nested_pool_inside_a_task() {
    let columns = ArgumentColumns::new().column("numbers", [json!([1, 2]), json!([3, 4, 5])]);
    let execution = quiet(builtin("square_batch"))
        .workers(2)
        .run_threaded(columns)
        .unwrap();

    assert_eq!(execution.results, ready([json!([1, 4]), json!([9, 16, 25])]));
}

// ─────────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_failures_are_isolated() {
    let columns = ArgumentColumns::new()
        .column("number", 0..5)
        .column("fail_at", [2; 5]);

    let execution = quiet(builtin("fail_on")).workers(2).run_threaded(columns).unwrap();

    assert!(!execution.cancelled);
    assert_eq!(execution.stats.completed, 4);
    assert_eq!(execution.stats.failed, 1);
    assert!(matches!(
        execution.results[2],
        ResultSlot::Failed(TaskError::Failed { .. })
    ));
    assert_eq!(execution.results[4], ResultSlot::Ready(json!(16)));
}

#[test]
fn test_panicking_task_does_not_stop_the_pool() {
    let fragile = TaskFunction::new("fragile", &["n"], |args| {
        let n: i64 = args.get("n")?;
        if n == 1 {
            panic!("cannot handle one");
        }
        Ok(json!(n))
    });

    let execution = quiet(fragile)
        .workers(1)
        .run_threaded(ArgumentColumns::new().column("n", 0..3))
        .unwrap();

    assert_eq!(execution.results[0], ResultSlot::Ready(json!(0)));
    match &execution.results[1] {
        ResultSlot::Failed(TaskError::Panicked { message }) => {
            assert!(message.contains("cannot handle one"))
        }
        other => panic!("expected a panic slot, got {other:?}"),
    }
    assert_eq!(execution.results[2], ResultSlot::Ready(json!(2)));
}

#[test]
fn test_wrong_parameter_names_fail_each_task() {
    let execution = quiet(builtin("square"))
        .workers(2)
        .run_threaded(ArgumentColumns::new().column("n", [1, 2]))
        .unwrap();

    for slot in &execution.results {
        match slot {
            ResultSlot::Failed(TaskError::InvalidArgument { message }) => {
                assert!(message.contains("unexpected argument 'n'"))
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }
}

#[test]
fn test_length_mismatch_is_an_error() {
    let columns = ArgumentColumns::new().column("a", [1, 2, 3]).column("b", [1]);
    let err = quiet(builtin("add")).run_threaded(columns).unwrap_err();

    match err {
        Error::LengthMismatch { expected, actual, .. } => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 1);
        }
        other => panic!("expected LengthMismatch, got {other:?}"),
    }
}

#[test]
fn test_empty_input() {
    let execution = quiet(builtin("square"))
        .run_threaded(ArgumentColumns::new().column("number", Vec::<i64>::new()))
        .unwrap();

    assert!(execution.results.is_empty());
    assert!(!execution.cancelled);
}

// ─────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_interrupt_keeps_partial_results() {
    let columns = ArgumentColumns::new()
        .column("number", 0..8)
        .column("sleep", [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);

    let interrupt = Interrupt::new();
    let trigger = interrupt.clone();
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.trigger();
    });

    let started = Instant::now();
    let execution = quiet(builtin("sleep_square"))
        .workers(2)
        .interrupt(interrupt)
        .run_threaded(columns)
        .unwrap();
    timer.join().unwrap();

    assert!(execution.cancelled);
    assert_eq!(execution.results.len(), 8);
    assert_eq!(
        &execution.results[..4],
        &ready([json!(0), json!(1), json!(4), json!(9)])[..]
    );
    // In flight when the interrupt fired: allowed to finish and kept
    assert_eq!(execution.results[4], ResultSlot::Ready(json!(16)));
    assert_eq!(execution.results[5], ResultSlot::Ready(json!(25)));
    // Never started
    assert!(execution.results[6].is_absent());
    assert!(execution.results[7].is_absent());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_interrupt_after_completion_is_not_a_cancel() {
    let interrupt = Interrupt::new();
    let parallelizer = quiet(builtin("square")).workers(2).interrupt(interrupt.clone());

    let execution = parallelizer
        .run_threaded(ArgumentColumns::new().column("number", 0..3))
        .unwrap();
    assert!(!execution.cancelled);

    interrupt.trigger();
    let execution = parallelizer
        .run_threaded(ArgumentColumns::new().column("number", 0..3))
        .unwrap();
    assert!(execution.cancelled);
}
