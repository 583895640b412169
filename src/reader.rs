//! The OS-data reader seam.
//!
//! Everything the engine knows about the machine comes through [`OsReader`].
//! Implementations never fail: a missing or malformed source yields a neutral
//! sentinel (`0`, `-1`, an empty string or `false`) and the engine treats that
//! as "no data" for the current cycle.

use once_cell::sync::Lazy;

/// Fallback used when `sysconf(_SC_CLK_TCK)` is unavailable.
const DEFAULT_CLOCK_TICKS: i64 = 100;

static CLOCK_TICKS: Lazy<i64> = Lazy::new(|| {
    // SAFETY: sysconf has no preconditions and only reads a configuration value.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as i64
    } else {
        DEFAULT_CLOCK_TICKS
    }
});

/// Returns the kernel's USER_HZ, read once per process.
pub fn clock_ticks_per_second() -> i64 {
    *CLOCK_TICKS
}

/// Machine-wide cumulative CPU time, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub total: u64,
    pub active: u64,
    pub idle: u64,
}

/// A snapshot of `/proc/meminfo` counters, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
    pub reclaimable: u64,
    pub shared: u64,
}

impl MemoryCounters {
    /// Fraction of memory held by applications, excluding buffers and page cache.
    ///
    /// Computed in floating point so inconsistent counters produce a value
    /// outside `[0, 1]` (or NaN for a zero total) instead of wrapping.
    pub fn used_fraction(&self) -> f64 {
        let total = self.total as f64;
        let used = total - self.free as f64;
        let cache = self.cached as f64 + self.reclaimable as f64 - self.shared as f64;
        (used - (self.buffers as f64 + cache)) / total
    }
}

/// Machine-wide counters that share one source, sampled together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemCounters {
    pub cpu: CpuCounters,
    pub total_processes: i32,
    pub running_processes: i32,
}

/// Source of raw operating-system counters.
pub trait OsReader: Send + Sync {
    /// Seconds since boot.
    fn system_uptime_seconds(&self) -> i64;

    fn cpu_counters(&self) -> CpuCounters;

    fn memory_counters(&self) -> MemoryCounters;

    /// Processes created since boot.
    fn total_processes(&self) -> i32;

    /// Processes currently in a runnable state.
    fn running_processes(&self) -> i32;

    /// Pids with a live process directory, in no particular order.
    fn live_pids(&self) -> Vec<i32>;

    fn process_command(&self, pid: i32) -> String;

    /// Virtual memory size in kB, `0` when unreadable.
    fn process_ram_kb(&self, pid: i32) -> i32;

    /// Real uid of the process, `-1` when unreadable.
    fn process_uid(&self, pid: i32) -> i32;

    /// Start time after boot, in clock ticks.
    fn process_start_ticks(&self, pid: i32) -> i64;

    /// utime + stime in clock ticks, `0` when unreadable.
    fn process_active_ticks(&self, pid: i32) -> u64;

    fn process_directory_exists(&self, pid: i32) -> bool;

    /// Name for `uid` from the user database, empty when not found.
    fn user_name(&self, uid: u32) -> String;

    fn operating_system(&self) -> String;

    fn kernel(&self) -> String;

    /// CPU counters and process counts from a single sample.
    ///
    /// Readers backed by one file should override this to read it once.
    fn system_counters(&self) -> SystemCounters {
        SystemCounters {
            cpu: self.cpu_counters(),
            total_processes: self.total_processes(),
            running_processes: self.running_processes(),
        }
    }

    fn ticks_per_second(&self) -> i64 {
        clock_ticks_per_second()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockProcess {
        pub command: String,
        pub ram_kb: i32,
        pub uid: i32,
        pub start_ticks: i64,
        pub active_ticks: u64,
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockState {
        pub uptime: i64,
        pub cpu: CpuCounters,
        pub memory: MemoryCounters,
        pub total_processes: i32,
        pub running_processes: i32,
        pub processes: BTreeMap<i32, MockProcess>,
        pub users: HashMap<u32, String>,
        pub os: String,
        pub kernel: String,
    }

    /// In-memory reader whose state tests mutate between refresh cycles.
    #[derive(Default)]
    pub(crate) struct MockReader {
        state: Mutex<MockState>,
        user_lookups: AtomicUsize,
        cpu_reads: AtomicUsize,
        command_reads: AtomicUsize,
        os_reads: AtomicUsize,
    }

    impl MockReader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn update(&self, f: impl FnOnce(&mut MockState)) {
            let mut state = self.state.lock().expect("mock state poisoned");
            f(&mut state);
        }

        pub fn spawn(&self, pid: i32, process: MockProcess) {
            self.update(|s| {
                s.processes.insert(pid, process);
            });
        }

        pub fn kill(&self, pid: i32) {
            self.update(|s| {
                s.processes.remove(&pid);
            });
        }

        pub fn user_lookups(&self) -> usize {
            self.user_lookups.load(Ordering::SeqCst)
        }

        pub fn cpu_reads(&self) -> usize {
            self.cpu_reads.load(Ordering::SeqCst)
        }

        pub fn command_reads(&self) -> usize {
            self.command_reads.load(Ordering::SeqCst)
        }

        pub fn os_reads(&self) -> usize {
            self.os_reads.load(Ordering::SeqCst)
        }

        fn with<T>(&self, f: impl FnOnce(&MockState) -> T) -> T {
            let state = self.state.lock().expect("mock state poisoned");
            f(&state)
        }

        fn process<T: Default>(&self, pid: i32, f: impl FnOnce(&MockProcess) -> T) -> T {
            self.with(|s| s.processes.get(&pid).map(f).unwrap_or_default())
        }
    }

    impl OsReader for MockReader {
        fn system_uptime_seconds(&self) -> i64 {
            self.with(|s| s.uptime)
        }

        fn cpu_counters(&self) -> CpuCounters {
            self.cpu_reads.fetch_add(1, Ordering::SeqCst);
            self.with(|s| s.cpu)
        }

        fn memory_counters(&self) -> MemoryCounters {
            self.with(|s| s.memory)
        }

        fn total_processes(&self) -> i32 {
            self.with(|s| s.total_processes)
        }

        fn running_processes(&self) -> i32 {
            self.with(|s| s.running_processes)
        }

        fn live_pids(&self) -> Vec<i32> {
            // reversed so callers can't rely on the reader's ordering
            self.with(|s| s.processes.keys().rev().copied().collect())
        }

        fn process_command(&self, pid: i32) -> String {
            self.command_reads.fetch_add(1, Ordering::SeqCst);
            self.process(pid, |p| p.command.clone())
        }

        fn process_ram_kb(&self, pid: i32) -> i32 {
            self.process(pid, |p| p.ram_kb)
        }

        fn process_uid(&self, pid: i32) -> i32 {
            self.with(|s| s.processes.get(&pid).map_or(-1, |p| p.uid))
        }

        fn process_start_ticks(&self, pid: i32) -> i64 {
            self.process(pid, |p| p.start_ticks)
        }

        fn process_active_ticks(&self, pid: i32) -> u64 {
            self.process(pid, |p| p.active_ticks)
        }

        fn process_directory_exists(&self, pid: i32) -> bool {
            self.with(|s| s.processes.contains_key(&pid))
        }

        fn user_name(&self, uid: u32) -> String {
            self.user_lookups.fetch_add(1, Ordering::SeqCst);
            self.with(|s| s.users.get(&uid).cloned().unwrap_or_default())
        }

        fn operating_system(&self) -> String {
            self.os_reads.fetch_add(1, Ordering::SeqCst);
            self.with(|s| s.os.clone())
        }

        fn kernel(&self) -> String {
            self.with(|s| s.kernel.clone())
        }

        fn ticks_per_second(&self) -> i64 {
            100
        }
    }
}
