//! parallelizer command-line entry point
//!
//! `run` drives a pool over the built-in functions; `worker` is the child
//! side of a process-mode pool and is started by `run`, never by hand.

mod cli;

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

use clap::Parser;
use tracing::{debug, error, info, warn};

use parallelizer::config::{self, ParallelizerConfig};
use parallelizer::error::{Error, Result};
use parallelizer::{builtins, logging, process as workers, version};
use parallelizer::{ArgumentColumns, Interrupt, Parallelizer};

use crate::cli::{Cli, Commands, ConfigSubcommand};

/// Exit status of a run stopped by Ctrl-C
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            if e.is_caller_error() {
                debug!(error = %e.format_for_log(), "Command rejected");
            } else {
                error!(error = %e.format_for_log(), "Command failed");
            }
            eprint!("{}", e.format_for_terminal());
            process::exit(e.exit_code());
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(0)
        }
        Commands::Functions => {
            list_functions();
            Ok(0)
        }
        Commands::Worker => {
            logging::init_worker()?;
            let served = workers::run_worker(&builtins::registry())?;
            debug!(served, "Worker exiting");
            Ok(0)
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)?;
            Ok(0)
        }
        Commands::Run {
            function,
            input,
            mode,
            workers,
            config,
            no_progress,
        } => {
            let mut settings = ParallelizerConfig::load(config.as_deref())?;
            if let Some(mode) = mode {
                settings.pool.mode = mode;
            }
            if let Some(workers) = workers {
                settings.pool.workers = workers;
                if workers == 0 {
                    return Err(Error::InvalidWorkerCount(0));
                }
            }
            if no_progress || cli.quiet {
                settings.progress.enabled = false;
            }

            let _log_guards = logging::init_logging(&settings.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(version = %build.full_version(), "Starting parallelizer");

            run(&function, &input, &settings)
        }
    }
}

fn run(function: &str, input: &Path, settings: &ParallelizerConfig) -> Result<i32> {
    let registry = builtins::registry();
    let function = registry.require(function)?.clone();
    let columns = read_columns(input)?;

    let interrupt = Interrupt::on_ctrl_c()?;
    let execution = Parallelizer::from_config(function, settings)
        .interrupt(interrupt)
        .run(settings.pool.mode, columns)?;

    info!(
        completed = execution.stats.completed,
        failed = execution.stats.failed,
        absent = execution.stats.absent,
        elapsed_ms = execution.stats.elapsed.as_millis() as u64,
        "Run complete"
    );

    println!("{}", serde_json::to_string(&execution)?);

    if execution.cancelled {
        warn!("Run was cancelled; unfinished results are null");
        return Ok(EXIT_CANCELLED);
    }
    Ok(0)
}

/// Parse the input file, or stdin for `-`
fn read_columns(input: &Path) -> Result<ArgumentColumns> {
    let content = if input == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|source| Error::IoRead {
                path: input.to_path_buf(),
                source,
            })?;
        buffer
    } else {
        fs::read_to_string(input).map_err(|source| Error::IoRead {
            path: input.to_path_buf(),
            source,
        })?
    };

    serde_json::from_str(&content).map_err(|e| Error::InvalidTaskList {
        message: format!(
            "{}: expected an object of argument arrays ({})",
            input.display(),
            e
        ),
    })
}

fn list_functions() {
    let registry = builtins::registry();
    for name in registry.names() {
        if let Some(function) = registry.get(name) {
            println!("{}({})", name, function.parameters().join(", "));
        }
    }
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = ParallelizerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            ParallelizerConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
