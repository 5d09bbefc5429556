// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! A thin entry point only: flags here override the `[worker]`/`[scheduler]`
//! sections of the config file (see `config::model`). No subcommands, no
//! interactive UI — the worker runtime is a library; this binary just wires
//! it up for local/manual runs.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `workdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "workdag",
    version,
    about = "Claim and execute tasks from a workflow scheduler.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Workdag.toml")]
    pub config: String,

    /// Base URL of the scheduler, overriding `[scheduler].url` in the config.
    #[arg(long, value_name = "URL")]
    pub scheduler_url: Option<String>,

    /// Number of worker processes (concurrent in-flight tasks), overriding
    /// `[worker].processes`.
    #[arg(long, value_name = "N")]
    pub processes: Option<usize>,

    /// Run as an assistant worker (stays alive on keep-alive regardless of
    /// whether it owns any pending work).
    #[arg(long)]
    pub assistant: bool,

    /// Explicit worker id. If omitted, one is generated from host/pid/salt.
    #[arg(long, value_name = "ID")]
    pub worker_id: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WORKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Hidden re-exec mode: run a single task in this process and exit.
    ///
    /// Used internally by `ProcessExecutor` to isolate task execution in a
    /// child OS process; not meant to be invoked directly.
    #[arg(long, hide = true)]
    pub worker_run_task: Option<String>,
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
