//! Configuration system tests
//!
//! Tests configuration loading, validation and how a loaded configuration
//! drives a run

mod common;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use common::{builtin, invalid_config_fixture, valid_config_fixture};
use parallelizer::config::{generate_default_config, init_config};
use parallelizer::{ArgumentColumns, Error, ExecutionMode, Parallelizer, ParallelizerConfig, ResultSlot};

/// Test fixture for configuration testing
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("parallelizer.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_valid_fixture() {
    let config = ParallelizerConfig::from_file(&valid_config_fixture()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.pool.workers, 2);
    assert_eq!(config.pool.mode, ExecutionMode::Threads);
    assert_eq!(config.pool.poll_interval(), Duration::from_millis(20));
    assert!(!config.progress.enabled);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_config_uses_defaults() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[pool]
mode = "processes"
"#,
    );

    let config = ParallelizerConfig::from_file(fixture.config_path.as_path()).unwrap();
    assert_eq!(config.pool.mode, ExecutionMode::Processes);
    assert_eq!(config.pool.workers, 0);
    assert_eq!(config.pool.poll_interval_ms, 50);
    assert_eq!(config.pool.worker_args, vec!["worker".to_string()]);
    assert!(config.progress.enabled);
}

#[test]
fn test_worker_program_tilde_is_expanded() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[pool]
worker_program = "~/bin/parallelizer"
"#,
    );

    let config = ParallelizerConfig::load(Some(fixture.path())).unwrap();
    let program = config.pool.worker_program.unwrap();
    assert!(!program.starts_with('~'), "{program}");
    assert!(program.ends_with("bin/parallelizer"));
}

#[test]
fn test_generated_default_is_loadable() {
    let fixture = ConfigFixture::new();
    fixture.write_config(&generate_default_config());

    let config = ParallelizerConfig::from_file(fixture.config_path.as_path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.pool.mode, ExecutionMode::Threads);
}

#[test]
fn test_init_config_creates_parents() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a").join("b").join("config.toml");

    let written = init_config(path.to_str(), false).unwrap();
    assert_eq!(written, path);
    assert!(fs::read_to_string(&path).unwrap().contains("[pool]"));

    assert!(init_config(path.to_str(), false).is_err());
    assert!(init_config(path.to_str(), true).is_ok());
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_fixture_fails_validation() {
    let config = ParallelizerConfig::from_file(&invalid_config_fixture()).unwrap();
    match config.validate() {
        Err(Error::ConfigValidation { field, .. }) => {
            assert_eq!(field.as_deref(), Some("pool.poll_interval_ms"))
        }
        other => panic!("expected ConfigValidation, got {other:?}"),
    }
}

#[test]
fn test_unknown_mode_is_a_parse_error() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[pool]
mode = "fibers"
"#,
    );

    let err = ParallelizerConfig::from_file(fixture.config_path.as_path()).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
    assert_eq!(err.exit_code(), 10);
}

#[test]
fn test_malformed_toml() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[pool\nworkers = ");

    let err = ParallelizerConfig::from_file(fixture.config_path.as_path()).unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
    assert!(err.suggestion().is_some());
}

#[test]
fn test_missing_explicit_file() {
    let err = ParallelizerConfig::load(Some("/nonexistent/parallelizer.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
}

// ─────────────────────────────────────────────────────────────────
// Configuration-driven runs
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_from_config() {
    let config = ParallelizerConfig::from_file(&valid_config_fixture()).unwrap();
    let parallelizer = Parallelizer::from_config(builtin("square"), &config);

    let execution = parallelizer
        .run(config.pool.mode, ArgumentColumns::new().column("number", [2, 3]))
        .unwrap();

    assert_eq!(
        execution.results,
        vec![ResultSlot::Ready(json!(4)), ResultSlot::Ready(json!(9))]
    );
    assert_eq!(execution.stats.workers, 2);
}
