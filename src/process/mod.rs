//! Worker processes
//!
//! The parent talks to each child over its stdin/stdout using one JSON
//! document per line (see [`protocol`]). Children are instances of a
//! program that runs [`run_worker`], by default this very executable
//! invoked as `parallelizer worker`.

pub mod protocol;

mod pool;
mod worker;

pub use pool::{JobHandle, ProcessPool, WorkerCommand};
pub use worker::{run_worker, serve};
