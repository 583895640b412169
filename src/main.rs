//! herakles-proc-top: live terminal process monitor for Linux.
//!
//! Samples /proc on every refresh cycle, derives machine-wide and
//! per-process CPU/RAM/uptime figures and renders them as a dashboard.
//! Subcommands cover system checks, config generation and headless snapshots.

use anyhow::Context;
use clap::Parser;
use herakles_proc_top::ProcessRegistry;
use std::fs::OpenOptions;
use std::io;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, error, info, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod cli;
mod commands;
mod config;
mod display;

use cli::{Args, Commands};
use commands::{command_check, command_config, command_snapshot};
use config::{resolve_config, show_config, validate_effective_config, Config};
use display::Dashboard;

/// Where log output goes for the current run mode.
enum LogTarget<'a> {
    Stderr,
    /// Dashboard mode: the file if configured, otherwise discarded.
    Dashboard(Option<&'a std::path::Path>),
}

/// Initializes the tracing subscriber; level `off` installs none.
fn setup_logging(config: &Config, target: LogTarget<'_>) -> anyhow::Result<()> {
    let level = config.log_level();
    if level == "off" {
        return Ok(());
    }
    let level = Level::from_str(level)
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", level, e))?;

    let (writer, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(io::stderr), true),
        LogTarget::Dashboard(Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        LogTarget::Dashboard(None) => (BoxMakeWriter::new(io::sink), false),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Configures the global rayon pool used for parallel refresh.
fn setup_thread_pool(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
            {
                Ok(()) => debug!("Rayon thread pool configured with {} threads", threads),
                Err(e) => error!("Failed to set rayon thread pool: {}", e),
            }
        }
    }
}

fn run_dashboard(config: &Config) -> anyhow::Result<()> {
    let mut registry =
        ProcessRegistry::new(config.proc_fs()).with_order(config.sort_order()?);
    registry.set_parallel(config.parallel_refresh.unwrap_or(false));

    info!("Starting herakles-proc-top");
    Dashboard::new(
        registry,
        config.rows(),
        config.refresh_interval(),
        config.input_slice(),
    )
    .run()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {e:#}");
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {e:#}");
        std::process::exit(1);
    }

    let target = match args.command {
        Some(_) => LogTarget::Stderr,
        None => LogTarget::Dashboard(config.log_file()),
    };
    setup_logging(&config, target)?;
    setup_thread_pool(&config);

    match args.command {
        Some(Commands::Check { proc, users, all }) => {
            if !command_check(proc, users, all, &config)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => command_config(output, format, commented),
        Some(Commands::Snapshot {
            iterations,
            limit,
            format,
        }) => command_snapshot(iterations, limit, format, &config),
        None => run_dashboard(&config),
    }
}
