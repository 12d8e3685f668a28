//! Built-in task functions
//!
//! These are what the `parallelizer` binary can run, and therefore what its
//! worker processes can serve. Each one takes JSON numbers and returns JSON
//! numbers; integers stay integers while they fit in an `i64`.

use std::process;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use crate::parallelizer::Parallelizer;
use crate::task::{ArgumentColumns, Arguments, TaskError, TaskFunction, TaskOutcome, TaskRegistry};

/// Exit status of a worker killed by `exit_on`
pub const SIMULATED_CRASH_STATUS: i32 = 17;

/// Every built-in function
pub fn registry() -> TaskRegistry {
    [
        TaskFunction::new("square", &["number"], square),
        TaskFunction::new("sleep_square", &["number", "sleep"], sleep_square),
        TaskFunction::new("add", &["a", "b"], add),
        TaskFunction::new("fail_on", &["number", "fail_at"], fail_on),
        TaskFunction::new("exit_on", &["number", "exit_at"], exit_on),
        TaskFunction::new("square_batch", &["numbers"], square_batch),
    ]
    .into_iter()
    .collect()
}

fn number(args: &Arguments, name: &str) -> Result<Value, TaskError> {
    match args.value(name) {
        Some(value @ Value::Number(_)) => Ok(value.clone()),
        Some(other) => Err(TaskError::invalid_argument(format!(
            "argument '{}' must be a number, got {}",
            name, other
        ))),
        None => Err(TaskError::invalid_argument(format!(
            "missing required argument '{}'",
            name
        ))),
    }
}

fn multiply(a: &Value, b: &Value) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(product) = x.checked_mul(y) {
            return json!(product);
        }
    }
    json!(a.as_f64().unwrap_or(f64::NAN) * b.as_f64().unwrap_or(f64::NAN))
}

fn sum(a: &Value, b: &Value) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(total) = x.checked_add(y) {
            return json!(total);
        }
    }
    json!(a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN))
}

fn square(args: &Arguments) -> TaskOutcome {
    let n = number(args, "number")?;
    Ok(multiply(&n, &n))
}

/// `number²` after sleeping `sleep` seconds
fn sleep_square(args: &Arguments) -> TaskOutcome {
    let n = number(args, "number")?;
    let seconds: f64 = args.get("sleep")?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TaskError::invalid_argument(format!(
            "argument 'sleep' must be a non-negative number of seconds, got {}",
            seconds
        )));
    }
    thread::sleep(Duration::from_secs_f64(seconds));
    Ok(multiply(&n, &n))
}

fn add(args: &Arguments) -> TaskOutcome {
    let a = number(args, "a")?;
    let b = number(args, "b")?;
    Ok(sum(&a, &b))
}

/// `number²`, or a task failure when `number == fail_at`
fn fail_on(args: &Arguments) -> TaskOutcome {
    let n = number(args, "number")?;
    let fail_at = number(args, "fail_at")?;
    if n == fail_at {
        return Err(TaskError::failed(format!("refusing to square {}", n)));
    }
    Ok(multiply(&n, &n))
}

/// `number²`, or ends the whole process when `number == exit_at`
fn exit_on(args: &Arguments) -> TaskOutcome {
    let n = number(args, "number")?;
    let exit_at = number(args, "exit_at")?;
    if n == exit_at {
        process::exit(SIMULATED_CRASH_STATUS);
    }
    Ok(multiply(&n, &n))
}

/// Squares a whole array with a nested thread pool
fn square_batch(args: &Arguments) -> TaskOutcome {
    let numbers: Vec<Value> = args.get("numbers")?;
    let columns = ArgumentColumns::new().column("number", numbers);

    let execution = Parallelizer::new(TaskFunction::new("square", &["number"], square))
        .workers(2)
        .verbose(false)
        .run_threaded(columns)
        .map_err(|e| TaskError::failed(e.to_string()))?;

    execution
        .results
        .into_iter()
        .map(|slot| match slot.into_value() {
            Some(value) => Ok(value),
            None => Err(TaskError::failed("nested square did not complete")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
