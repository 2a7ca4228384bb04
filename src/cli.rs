// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `suiterun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "suiterun",
    version,
    about = "Run test suites across long-lived worker environments.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run plan (TOML).
    ///
    /// Default: `Suiterun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Suiterun.toml")]
    pub plan: String,

    /// Start every environment with its debug flag set.
    #[arg(long)]
    pub debug: bool,

    /// Pass worker output through to stdout as it arrives.
    #[arg(long)]
    pub show_output: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SUITERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the environment groups, but don't start any
    /// worker.
    #[arg(long)]
    pub dry_run: bool,
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
