// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procpump`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procpump",
    version,
    about = "Run a program with pumped stdio and coordinated shutdown.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a settings file (TOML).
    ///
    /// Default: `Procpump.toml` in the current directory, if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCPUMP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Exit codes that count as success (default from settings, usually 0).
    #[arg(long = "accept", value_name = "CODE", num_args = 1.., allow_negative_numbers = true)]
    pub accept: Vec<i32>,

    /// Log output line by line through the logger instead of copying bytes.
    #[arg(long)]
    pub lines: bool,

    /// Working directory for the program.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Forward our stdin to the program (otherwise it reads /dev/null).
    #[arg(long)]
    pub stdin: bool,

    /// Program to run, followed by its arguments.
    #[arg(
        value_name = "PROGRAM",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
