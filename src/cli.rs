//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use parallelizer::ExecutionMode;

/// Run a built-in task function over columns of JSON arguments on a pool of
/// threads or worker processes
#[derive(Parser, Debug)]
#[command(name = "parallelizer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a function once per row of the input columns and print the
    /// ordered results as JSON
    Run {
        /// Built-in function name (see `parallelizer functions`)
        #[arg(short, long)]
        function: String,

        /// JSON object mapping each parameter to an array of values, or `-`
        /// for stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Where workers run; defaults to the configured mode
        #[arg(short, long, value_enum)]
        mode: Option<ExecutionMode>,

        /// Number of workers; defaults to CPUs - 1
        #[arg(short, long)]
        workers: Option<usize>,

        /// Path to configuration file
        #[arg(short, long, env = "PARALLELIZER_CONFIG")]
        config: Option<String>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Serve jobs on stdin/stdout (started by process-mode pools)
    #[command(hide = true)]
    Worker,

    /// List the built-in task functions
    Functions,

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    Init {
        /// Where to create the file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Check a configuration file
    Validate {
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "parallelizer", "run", "--function", "square", "--input", "args.json",
        ]);
        match cli.command {
            Commands::Run { function, input, mode, workers, config, no_progress } => {
                assert_eq!(function, "square");
                assert_eq!(input, PathBuf::from("args.json"));
                assert!(mode.is_none());
                assert!(workers.is_none());
                assert!(config.is_none());
                assert!(!no_progress);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_mode_and_workers() {
        let cli = Cli::parse_from([
            "parallelizer", "run", "-f", "add", "-i", "-", "--mode", "processes", "-w", "3",
            "--no-progress",
        ]);
        match cli.command {
            Commands::Run { mode, workers, no_progress, .. } => {
                assert_eq!(mode, Some(ExecutionMode::Processes));
                assert_eq!(workers, Some(3));
                assert!(no_progress);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let result = Cli::try_parse_from([
            "parallelizer", "run", "-f", "square", "-i", "-", "--mode", "gpu",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_worker_command() {
        let cli = Cli::parse_from(["parallelizer", "worker"]);
        assert!(matches!(cli.command, Commands::Worker));
    }

    #[test]
    fn test_verbose_flag() {
        let cli = Cli::parse_from(["parallelizer", "-vv", "functions"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["parallelizer", "config", "init", "--path", "/tmp/p.toml", "--force"]);
        match cli.command {
            Commands::Config { subcommand: ConfigSubcommand::Init { path, force } } => {
                assert_eq!(path.as_deref(), Some("/tmp/p.toml"));
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
