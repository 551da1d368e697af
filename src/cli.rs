// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskstream`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskstream",
    version,
    about = "Run a process and stream its lifecycle events.",
    long_about = None
)]
pub struct CliArgs {
    /// Load the task from a TOML task file instead of the command line.
    #[arg(long, value_name = "PATH", conflicts_with = "program")]
    pub task_file: Option<PathBuf>,

    /// Working directory for the process (overrides the task file).
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment variable for the process. Repeatable.
    ///
    /// If given at least once, the process gets exactly these variables and
    /// does not inherit the caller's environment.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Text written to the process's stdin. Repeatable; units are written in
    /// order.
    #[arg(long = "input", value_name = "TEXT")]
    pub input: Vec<String>,

    /// What to print.
    #[arg(long, value_enum, default_value_t = OutputMode::Events)]
    pub mode: OutputMode,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKSTREAM_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the command that would run, but don't run it.
    #[arg(long)]
    pub dry_run: bool,

    /// Executable to run.
    #[arg(value_name = "PROGRAM", required_unless_present = "task_file")]
    pub program: Option<String>,

    /// Arguments passed verbatim to PROGRAM.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Which projection of the event stream to print.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Every event, one per line.
    Events,
    /// Raw stdout and stderr bytes only.
    Output,
    /// The exit status only.
    ExitStatus,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing variable name in '{s}'")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
