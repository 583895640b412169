//! CLI arguments and subcommands for herakles-proc-top.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for the snapshot subcommand
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SnapshotFormat {
    Table,
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-top",
    about = "Live terminal process monitor for Linux",
    long_about = "Live terminal process monitor for Linux.\n\n\
                  Samples /proc on every refresh and shows machine-wide CPU and memory \
                  utilization together with a per-process table (CPU share, RAM, uptime), \
                  ordered by CPU or memory.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Keys: Up/c toggle CPU order, Down/m toggle memory order, +/- rows, q quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Log level (overrides config)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Write logs to this file (enables file logging)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Refresh interval in milliseconds
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,

    /// Number of process rows shown
    #[arg(short = 'n', long)]
    pub rows: Option<usize>,

    /// Initial sort order (cpu-asc, cpu-desc, mem-asc, mem-desc)
    #[arg(long)]
    pub sort: Option<String>,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Refresh processes in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check the proc filesystem
        #[arg(long)]
        proc: bool,

        /// Check the user database
        #[arg(long)]
        users: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Sample without the dashboard and print the process table
    Snapshot {
        /// Number of refresh cycles, one interval apart
        #[arg(short = 'n', long, default_value_t = 2)]
        iterations: usize,

        /// Maximum number of processes to print
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: SnapshotFormat,
    },
}
