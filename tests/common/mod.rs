//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use parallelizer::builtins;
use parallelizer::{TaskFunction, WorkerCommand};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// The built binary, serving the built-in registry as `parallelizer worker`
pub fn worker_command() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_parallelizer"), ["worker"])
}

/// A built-in function by name
pub fn builtin(name: &str) -> TaskFunction {
    builtins::registry()
        .require(name)
        .cloned()
        .unwrap_or_else(|e| panic!("no built-in {name}: {e}"))
}
