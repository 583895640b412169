//! `/proc` backed implementation of [`OsReader`].
//!
//! Readers are split into a thin I/O layer on [`ProcFs`] and pure `parse_*`
//! functions over file contents, so parsing is testable without a live
//! `/proc`. I/O failures are logged at debug level and mapped to sentinels.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::reader::{CpuCounters, MemoryCounters, OsReader, SystemCounters};

const DEFAULT_PROC_ROOT: &str = "/proc";
const DEFAULT_PASSWD_PATH: &str = "/etc/passwd";
const DEFAULT_OS_RELEASE_PATH: &str = "/etc/os-release";

/// CPU statistics from one `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        self.active() + self.idle_total()
    }

    /// Time spent doing work. guest and guest_nice are already part of
    /// user and nice, so they are not read at all.
    pub fn active(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }

    /// Calculate non-active time (idle + iowait).
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

impl From<CpuStat> for CpuCounters {
    fn from(stat: CpuStat) -> Self {
        CpuCounters {
            total: stat.total(),
            active: stat.active(),
            idle: stat.idle_total(),
        }
    }
}

/// The parts of /proc/stat the monitor cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatSummary {
    pub cpu: Option<CpuStat>,
    /// Forks since boot.
    pub processes: i32,
    pub procs_running: i32,
}

/// Fields of /proc/<pid>/stat used for CPU and age accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidStat {
    pub active_ticks: u64,
    pub start_ticks: i64,
}

/// Reads OS state from a proc filesystem and the local user database.
#[derive(Debug, Clone)]
pub struct ProcFs {
    proc_root: PathBuf,
    passwd_path: PathBuf,
    os_release_path: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROC_ROOT,
            DEFAULT_PASSWD_PATH,
            DEFAULT_OS_RELEASE_PATH,
        )
    }
}

impl ProcFs {
    pub fn new(
        proc_root: impl Into<PathBuf>,
        passwd_path: impl Into<PathBuf>,
        os_release_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            passwd_path: passwd_path.into(),
            os_release_path: os_release_path.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    pub fn passwd_path(&self) -> &Path {
        &self.passwd_path
    }

    fn pid_path(&self, pid: i32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    fn read(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_stat(&self) -> StatSummary {
        self.read(&self.proc_root.join("stat"))
            .map(|c| parse_stat(&c))
            .unwrap_or_default()
    }

    fn read_pid_stat(&self, pid: i32) -> Option<PidStat> {
        let content = self.read(&self.pid_path(pid).join("stat"))?;
        let stat = parse_pid_stat(&content);
        if stat.is_none() {
            debug!("Invalid stat format for pid {}", pid);
        }
        stat
    }

    fn read_status(&self, pid: i32) -> Option<String> {
        self.read(&self.pid_path(pid).join("status"))
    }
}

impl OsReader for ProcFs {
    fn system_uptime_seconds(&self) -> i64 {
        self.read(&self.proc_root.join("uptime"))
            .map(|c| parse_uptime(&c))
            .unwrap_or(0)
    }

    fn cpu_counters(&self) -> CpuCounters {
        self.read_stat()
            .cpu
            .map(CpuCounters::from)
            .unwrap_or_default()
    }

    fn memory_counters(&self) -> MemoryCounters {
        self.read(&self.proc_root.join("meminfo"))
            .map(|c| parse_meminfo(&c))
            .unwrap_or_default()
    }

    fn total_processes(&self) -> i32 {
        self.read_stat().processes
    }

    fn running_processes(&self) -> i32 {
        self.read_stat().procs_running
    }

    /// One read of /proc/stat for the CPU line and both process counts.
    fn system_counters(&self) -> SystemCounters {
        let stat = self.read_stat();
        SystemCounters {
            cpu: stat.cpu.map(CpuCounters::from).unwrap_or_default(),
            total_processes: stat.processes,
            running_processes: stat.procs_running,
        }
    }

    /// Scans the proc root for directories with numeric names.
    fn live_pids(&self) -> Vec<i32> {
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Failed to list {}: {}", self.proc_root.display(), e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(v) => v,
                None => continue,
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Ok(pid) = name.parse::<i32>() {
                out.push(pid);
            }
        }
        out
    }

    /// Full command line, or `[comm]` for processes without one (kernel threads).
    fn process_command(&self, pid: i32) -> String {
        let path = self.pid_path(pid);
        if let Ok(content) = fs::read(path.join("cmdline")) {
            let cmd = parse_cmdline(&content);
            if !cmd.is_empty() {
                return cmd;
            }
        }

        self.read(&path.join("comm"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| format!("[{s}]"))
            .unwrap_or_default()
    }

    fn process_ram_kb(&self, pid: i32) -> i32 {
        self.read_status(pid)
            .and_then(|c| parse_status_field(&c, "VmSize:"))
            .and_then(|kb| i32::try_from(kb).ok())
            .unwrap_or(0)
    }

    fn process_uid(&self, pid: i32) -> i32 {
        self.read_status(pid)
            .and_then(|c| parse_status_field(&c, "Uid:"))
            .and_then(|uid| i32::try_from(uid).ok())
            .unwrap_or(-1)
    }

    fn process_start_ticks(&self, pid: i32) -> i64 {
        self.read_pid_stat(pid).map_or(0, |s| s.start_ticks)
    }

    fn process_active_ticks(&self, pid: i32) -> u64 {
        self.read_pid_stat(pid).map_or(0, |s| s.active_ticks)
    }

    fn process_directory_exists(&self, pid: i32) -> bool {
        self.pid_path(pid).is_dir()
    }

    fn user_name(&self, uid: u32) -> String {
        self.read(&self.passwd_path)
            .map(|c| find_user_name(&c, uid))
            .unwrap_or_default()
    }

    fn operating_system(&self) -> String {
        self.read(&self.os_release_path)
            .map(|c| parse_os_release(&c))
            .unwrap_or_default()
    }

    fn kernel(&self) -> String {
        self.read(&self.proc_root.join("version"))
            .map(|c| parse_kernel_version(&c))
            .unwrap_or_default()
    }
}

/// Parses one `cpu` line of /proc/stat. Missing trailing fields count as zero.
pub fn parse_cpu_line(line: &str) -> Option<CpuStat> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 || !parts[0].starts_with("cpu") {
        return None;
    }

    let field = |i: usize| -> u64 {
        parts
            .get(i)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    Some(CpuStat {
        user: field(1),
        nice: field(2),
        system: field(3),
        idle: field(4),
        iowait: field(5),
        irq: field(6),
        softirq: field(7),
        steal: field(8),
    })
}

/// Extracts the aggregate cpu line and process counters from /proc/stat.
pub fn parse_stat(content: &str) -> StatSummary {
    let mut summary = StatSummary::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("cpu") => summary.cpu = parse_cpu_line(line),
            Some("processes") => {
                summary.processes = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            }
            Some("procs_running") => {
                summary.procs_running = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            }
            _ => {}
        }
    }

    summary
}

/// Parses kilobyte values from "Key:   1234 kB" style lines.
fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Reads the memory counters the utilization formula needs from /proc/meminfo.
pub fn parse_meminfo(content: &str) -> MemoryCounters {
    let mut mem = MemoryCounters::default();

    for line in content.lines() {
        let (key, rest) = match line.split_once(':') {
            Some(kv) => kv,
            None => continue,
        };
        let slot = match key {
            "MemTotal" => &mut mem.total,
            "MemFree" => &mut mem.free,
            "Buffers" => &mut mem.buffers,
            "Cached" => &mut mem.cached,
            "SReclaimable" => &mut mem.reclaimable,
            "Shmem" => &mut mem.shared,
            _ => continue,
        };
        *slot = parse_kb_value(rest).unwrap_or(0);
    }

    mem
}

/// Seconds since boot, rounded, from the first field of /proc/uptime.
pub fn parse_uptime(content: &str) -> i64 {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .map(|secs| secs.round() as i64)
        .unwrap_or(0)
}

/// Kernel release: the third token of /proc/version.
pub fn parse_kernel_version(content: &str) -> String {
    content
        .split_whitespace()
        .nth(2)
        .map(str::to_string)
        .unwrap_or_default()
}

/// `PRETTY_NAME` from an os-release file, without quotes.
pub fn parse_os_release(content: &str) -> String {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "PRETTY_NAME")
        .map(|(_, value)| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .unwrap_or_default()
}

/// Parses /proc/<pid>/stat.
///
/// Fields are counted after the closing parenthesis of `comm`, which may itself
/// contain spaces and parentheses. utime and stime are fields 14 and 15,
/// starttime is field 22 (1-based, see proc_pid_stat(5)).
pub fn parse_pid_stat(content: &str) -> Option<PidStat> {
    let rest = &content[content.rfind(')')? + 1..];
    let parts: Vec<&str> = rest.split_whitespace().collect();

    // parts[0] is field 3 (state)
    const UTIME: usize = 14 - 3;
    const STIME: usize = 15 - 3;
    const STARTTIME: usize = 22 - 3;

    if parts.len() <= STARTTIME {
        return None;
    }

    let utime: u64 = parts[UTIME].parse().ok()?;
    let stime: u64 = parts[STIME].parse().ok()?;
    let start_ticks: i64 = parts[STARTTIME].parse().ok()?;

    Some(PidStat {
        active_ticks: utime + stime,
        start_ticks,
    })
}

/// First numeric value following `key` in /proc/<pid>/status.
pub fn parse_status_field(content: &str, key: &str) -> Option<i64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}

/// Renders a NUL separated /proc/<pid>/cmdline as a single line.
pub fn parse_cmdline(content: &[u8]) -> String {
    content
        .split(|&b| b == 0u8)
        .filter(|part| !part.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name of the first passwd entry whose uid field equals `uid`.
pub fn find_user_name(passwd: &str, uid: u32) -> String {
    passwd
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let entry_uid: u32 = fields.next()?.trim().parse().ok()?;
            (entry_uid == uid && !name.is_empty()).then(|| name.to_string())
        })
        .unwrap_or_default()
}
