//! Headless sampling command implementation.
//!
//! Runs the registry for a few refresh cycles and prints the result, either
//! as a plain table or as a YAML/JSON/TOML document.

use herakles_proc_top::format::{elapsed_time, progress_bar, truncate};
use herakles_proc_top::{ProcessRegistry, RegistrySnapshot};
use std::fmt::Write as _;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::SnapshotFormat;
use crate::config::Config;

/// Refreshes `iterations` times, one interval apart, then prints the snapshot.
///
/// The first cycle only establishes CPU baselines, so fewer than two
/// iterations reports zero utilization.
pub fn command_snapshot(
    iterations: usize,
    limit: usize,
    format: SnapshotFormat,
    config: &Config,
) -> anyhow::Result<()> {
    let mut registry = ProcessRegistry::new(config.proc_fs()).with_order(config.sort_order()?);
    registry.set_parallel(config.parallel_refresh.unwrap_or(false));

    let interval = config.refresh_interval();
    let iterations = iterations.max(1);

    for iteration in 1..=iterations {
        let start = Instant::now();
        registry.refresh();
        debug!(
            "Snapshot iteration {}/{} took {:.2}ms",
            iteration,
            iterations,
            start.elapsed().as_secs_f64() * 1000.0
        );

        if iteration < iterations {
            thread::sleep(interval);
        }
    }

    let snapshot = registry.snapshot(limit);
    info!(
        "Snapshot captured: {} of {} tracked processes",
        snapshot.processes.len(),
        snapshot.tracked_processes
    );

    let output = match format {
        SnapshotFormat::Table => render_table(&snapshot),
        SnapshotFormat::Json => serde_json::to_string_pretty(&snapshot)?,
        SnapshotFormat::Yaml => serde_yaml::to_string(&snapshot)?,
        SnapshotFormat::Toml => toml::to_string_pretty(&snapshot)?,
    };
    println!("{output}");
    Ok(())
}

/// Renders the snapshot the way the dashboard lays it out.
pub fn render_table(snapshot: &RegistrySnapshot) -> String {
    let mut out = String::new();

    writeln!(out, "OS: {}", snapshot.operating_system).ok();
    writeln!(out, "Kernel: {}", snapshot.kernel).ok();
    writeln!(
        out,
        "CPU: {}",
        progress_bar(snapshot.cpu_percent / 100.0)
    ).ok();
    writeln!(
        out,
        "Memory: {}",
        progress_bar(snapshot.memory_percent / 100.0)
    ).ok();
    writeln!(out, "Total Processes: {}", snapshot.total_processes).ok();
    writeln!(out, "Running Processes: {}", snapshot.running_processes).ok();
    writeln!(
        out,
        "Up Time: {}",
        elapsed_time(snapshot.up_time_seconds)
    ).ok();
    writeln!(out, "Order: {}", snapshot.order).ok();
    writeln!(out).ok();

    writeln!(
        out,
        "{:>7} {:<8} {:>7} {:>7} {:>9} COMMAND",
        "PID", "USER", "CPU[%]", "RAM[MB]", "TIME+"
    ).ok();
    for p in &snapshot.processes {
        writeln!(
            out,
            "{:>7} {:<8} {:>7.1} {:>7} {:>9} {}",
            p.pid,
            truncate(&p.user, 8),
            p.cpu_percent,
            p.ram_mb,
            elapsed_time(p.up_time_seconds),
            truncate(&p.command, 60)
        ).ok();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_proc_top::{ProcessOrder, ProcessView};

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot {
            generated_at: "2026-01-01T00:00:00+00:00".to_string(),
            operating_system: "Debian GNU/Linux 12 (bookworm)".to_string(),
            kernel: "6.1.0-18-amd64".to_string(),
            up_time_seconds: 3723,
            cpu_percent: 50.0,
            memory_percent: 25.0,
            total_processes: 120,
            running_processes: 2,
            tracked_processes: 2,
            order: ProcessOrder::CpuDesc,
            processes: vec![
                ProcessView {
                    pid: 4242,
                    user: "postgres-admin".to_string(),
                    cpu_percent: 12.5,
                    ram_mb: 512,
                    up_time_seconds: 61,
                    command: "postgres: checkpointer".to_string(),
                },
                ProcessView {
                    pid: 2,
                    user: "root".to_string(),
                    cpu_percent: 0.0,
                    ram_mb: 0,
                    up_time_seconds: 0,
                    command: "[kthreadd]".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&snapshot());

        assert!(table.contains("Kernel: 6.1.0-18-amd64"));
        assert!(table.contains("Up Time: 01:02:03"));
        assert!(table.contains(" 50.0/100%"));
        assert!(table.contains("Order: cpu-desc"));

        let rows: Vec<&str> = table.lines().skip_while(|l| !l.contains("PID")).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].contains("postgres"));
        // user column is cut to eight characters
        assert!(!rows[1].contains("postgres-admin"));
        assert!(rows[1].contains("00:01:01"));
        assert!(rows[2].ends_with("[kthreadd]"));
    }

    #[test]
    fn test_structured_formats_serialize() {
        let snap = snapshot();
        let json = serde_json::to_string(&snap).expect("json");
        assert!(json.contains("\"order\":\"cpu-desc\""));
        assert!(toml::to_string(&snap).is_ok());
        assert!(serde_yaml::to_string(&snap).is_ok());
    }
}
