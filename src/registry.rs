//! The process registry: one refresh cycle across samplers and processes.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::process::ProcessEntry;
use crate::reader::OsReader;
use crate::sampler::{CpuSampler, MemorySampler, Sampler};
use crate::users::UidNameCache;

/// Ordering applied to the process list after every refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessOrder {
    CpuAsc,
    #[default]
    CpuDesc,
    MemAsc,
    MemDesc,
}

impl ProcessOrder {
    /// Descending CPU flips to ascending; every other order goes to
    /// descending CPU.
    pub fn toggled_by_cpu(self) -> Self {
        match self {
            ProcessOrder::CpuDesc => ProcessOrder::CpuAsc,
            _ => ProcessOrder::CpuDesc,
        }
    }

    /// Descending memory flips to ascending; every other order goes to
    /// descending memory.
    pub fn toggled_by_memory(self) -> Self {
        match self {
            ProcessOrder::MemDesc => ProcessOrder::MemAsc,
            _ => ProcessOrder::MemDesc,
        }
    }

    fn compare(self, a: &ProcessEntry, b: &ProcessEntry) -> Ordering {
        let by_cpu = || {
            a.cpu_utilization()
                .partial_cmp(&b.cpu_utilization())
                .unwrap_or(Ordering::Equal)
        };
        let by_mem = || a.ram_mb().cmp(&b.ram_mb());

        match self {
            ProcessOrder::CpuAsc => by_cpu(),
            ProcessOrder::CpuDesc => by_cpu().reverse(),
            ProcessOrder::MemAsc => by_mem(),
            ProcessOrder::MemDesc => by_mem().reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessOrder::CpuAsc => "cpu-asc",
            ProcessOrder::CpuDesc => "cpu-desc",
            ProcessOrder::MemAsc => "mem-asc",
            ProcessOrder::MemDesc => "mem-desc",
        }
    }
}

impl fmt::Display for ProcessOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu-asc" => Ok(ProcessOrder::CpuAsc),
            "cpu-desc" | "cpu" => Ok(ProcessOrder::CpuDesc),
            "mem-asc" | "memory-asc" => Ok(ProcessOrder::MemAsc),
            "mem-desc" | "memory-desc" | "mem" | "memory" => Ok(ProcessOrder::MemDesc),
            other => Err(format!(
                "Invalid sort order '{}', expected one of cpu-asc, cpu-desc, mem-asc, mem-desc",
                other
            )),
        }
    }
}

/// Serializable view of one process for non-interactive output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessView {
    pub pid: i32,
    pub user: String,
    pub cpu_percent: f32,
    pub ram_mb: i32,
    pub up_time_seconds: i64,
    pub command: String,
}

impl From<&ProcessEntry> for ProcessView {
    fn from(entry: &ProcessEntry) -> Self {
        ProcessView {
            pid: entry.pid(),
            user: entry.user().to_string(),
            cpu_percent: entry.cpu_utilization() * 100.0,
            ram_mb: entry.ram_mb(),
            up_time_seconds: entry.up_time(),
            command: entry.command().to_string(),
        }
    }
}

/// Serializable view of the registry after a refresh.
///
/// Scalar fields come before `processes` so the TOML encoder accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub generated_at: String,
    pub operating_system: String,
    pub kernel: String,
    pub up_time_seconds: i64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub total_processes: i32,
    pub running_processes: i32,
    pub tracked_processes: usize,
    pub order: ProcessOrder,
    pub processes: Vec<ProcessView>,
}

/// Tracks the machine and the set of live processes across refresh cycles.
pub struct ProcessRegistry<R> {
    reader: R,
    users: UidNameCache,
    cpu: CpuSampler,
    memory: MemorySampler,
    up_time: i64,
    procs_running: i32,
    procs_total: i32,
    processes: Vec<ProcessEntry>,
    os_name: OnceCell<String>,
    kernel: OnceCell<String>,
    order: ProcessOrder,
    parallel: bool,
}

impl<R: OsReader> ProcessRegistry<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            users: UidNameCache::new(),
            cpu: CpuSampler::new(),
            memory: MemorySampler::new(),
            up_time: 0,
            procs_running: 0,
            procs_total: 0,
            processes: Vec::new(),
            os_name: OnceCell::new(),
            kernel: OnceCell::new(),
            order: ProcessOrder::default(),
            parallel: false,
        }
    }

    pub fn with_order(mut self, order: ProcessOrder) -> Self {
        self.order = order;
        self
    }

    /// Refresh entries on the rayon pool instead of sequentially.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Advances one sampling cycle.
    #[instrument(skip(self), level = "debug")]
    pub fn refresh(&mut self) {
        let start = Instant::now();

        self.up_time = self.reader.system_uptime_seconds();

        let counters = self.reader.system_counters();
        self.cpu.update(counters.cpu);
        self.memory.refresh(&self.reader);

        self.procs_running = counters.running_processes;
        self.procs_total = counters.total_processes;

        let (removed, added) = self.reconcile();
        self.refresh_entries();
        self.sort_processes();

        debug!(
            "Refresh completed: {} tracked, {} added, {} removed, {:.2}ms",
            self.processes.len(),
            added,
            removed,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    /// Drops ended processes and starts tracking newly appeared pids.
    ///
    /// Returns `(removed, added)`.
    fn reconcile(&mut self) -> (usize, usize) {
        let reader = &self.reader;

        let before = self.processes.len();
        self.processes.retain(|p| !p.has_ended(reader));
        let removed = before - self.processes.len();

        let live: BTreeSet<i32> = reader.live_pids().into_iter().collect();
        let tracked: BTreeSet<i32> = self.processes.iter().map(ProcessEntry::pid).collect();

        let new_pids: Vec<i32> = live.difference(&tracked).copied().collect();
        let added = new_pids.len();

        let users = &mut self.users;
        self.processes.extend(
            new_pids
                .into_iter()
                .map(|pid| ProcessEntry::new(pid, reader, users)),
        );

        (removed, added)
    }

    fn refresh_entries(&mut self) {
        let reader: &dyn OsReader = &self.reader;
        let up_time = self.up_time;
        let delta = self.cpu.active_ticks_delta();

        if self.parallel {
            self.processes
                .par_iter_mut()
                .for_each(|p| p.refresh(reader, up_time, delta));
        } else {
            for p in self.processes.iter_mut() {
                p.refresh(reader, up_time, delta);
            }
        }
    }

    fn sort_processes(&mut self) {
        let order = self.order;
        self.processes.sort_unstable_by(|a, b| order.compare(a, b));
    }

    pub fn toggle_order_by_cpu(&mut self) {
        self.order = self.order.toggled_by_cpu();
    }

    pub fn toggle_order_by_memory(&mut self) {
        self.order = self.order.toggled_by_memory();
    }

    pub fn order(&self) -> ProcessOrder {
        self.order
    }

    pub fn cpu_utilization(&self) -> f32 {
        self.cpu.utilization()
    }

    pub fn memory_utilization(&self) -> f32 {
        self.memory.utilization()
    }

    /// Seconds since boot as of the last refresh.
    pub fn up_time(&self) -> i64 {
        self.up_time
    }

    pub fn total_processes(&self) -> i32 {
        self.procs_total
    }

    pub fn running_processes(&self) -> i32 {
        self.procs_running
    }

    /// Tracked processes in the current order.
    pub fn processes(&self) -> &[ProcessEntry] {
        &self.processes
    }

    /// Read once it is non-empty, then cached for the registry's lifetime.
    pub fn operating_system(&self) -> &str {
        cached_non_empty(&self.os_name, || self.reader.operating_system())
    }

    /// Read once it is non-empty, then cached for the registry's lifetime.
    pub fn kernel(&self) -> &str {
        cached_non_empty(&self.kernel, || self.reader.kernel())
    }

    /// Captures the current state with at most `limit` processes.
    pub fn snapshot(&self, limit: usize) -> RegistrySnapshot {
        RegistrySnapshot {
            generated_at: chrono::Utc::now().to_rfc3339(),
            operating_system: self.operating_system().to_string(),
            kernel: self.kernel().to_string(),
            up_time_seconds: self.up_time,
            cpu_percent: self.cpu_utilization() * 100.0,
            memory_percent: self.memory_utilization() * 100.0,
            total_processes: self.procs_total,
            running_processes: self.procs_running,
            tracked_processes: self.processes.len(),
            order: self.order,
            processes: self
                .processes
                .iter()
                .take(limit)
                .map(ProcessView::from)
                .collect(),
        }
    }
}

fn cached_non_empty<'a>(cell: &'a OnceCell<String>, read: impl FnOnce() -> String) -> &'a str {
    cell.get_or_try_init(|| {
        let value = read();
        if value.is_empty() {
            Err(())
        } else {
            Ok(value)
        }
    })
    .map(String::as_str)
    .unwrap_or("")
}
