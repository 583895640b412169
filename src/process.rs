//! Per-process state tracked across refresh cycles.

use tracing::{debug, warn};

use crate::reader::OsReader;
use crate::users::UidNameCache;

/// A process observed by the registry.
///
/// Identity (pid, user, command, start time) is resolved once at
/// construction; the derived fields are rewritten by [`ProcessEntry::refresh`].
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pid: i32,
    user: String,
    command: String,
    /// Seconds after boot.
    start_time_after_boot: i64,
    ram_mb: i32,
    up_time: i64,
    prev_active_ticks: u64,
    cpu_utilization: f32,
}

impl ProcessEntry {
    /// Resolves the immutable identity of `pid`.
    ///
    /// Derived fields stay zero until the first refresh.
    pub fn new(pid: i32, reader: &dyn OsReader, users: &mut UidNameCache) -> Self {
        let uid = reader.process_uid(pid);
        let user = users.lookup(uid, reader);
        let command = reader.process_command(pid);

        let ticks_per_second = reader.ticks_per_second().max(1);
        let start_time_after_boot = reader.process_start_ticks(pid) / ticks_per_second;

        debug!(
            "Tracking process {} (user: {:?}, started {}s after boot)",
            pid, user, start_time_after_boot
        );

        Self {
            pid,
            user,
            command,
            start_time_after_boot,
            ram_mb: 0,
            up_time: 0,
            prev_active_ticks: 0,
            cpu_utilization: 0.0,
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Share of the machine's active ticks this process consumed during the
    /// last interval, in `[0, 1]` under normal sampling.
    pub fn cpu_utilization(&self) -> f32 {
        self.cpu_utilization
    }

    /// Virtual memory size in MB.
    pub fn ram_mb(&self) -> i32 {
        self.ram_mb
    }

    /// Seconds since the process started.
    pub fn up_time(&self) -> i64 {
        self.up_time
    }

    pub fn start_time_after_boot(&self) -> i64 {
        self.start_time_after_boot
    }

    /// True once the process directory is gone.
    pub fn has_ended(&self, reader: &dyn OsReader) -> bool {
        !reader.process_directory_exists(self.pid)
    }

    /// Re-derives RAM, uptime and CPU share for one cycle.
    ///
    /// When the process reports zero active ticks (unreadable stat, or a
    /// kernel thread without accounting) RAM, uptime and CPU are all reported
    /// as zero for the cycle, even if RAM and uptime were readable.
    pub fn refresh(
        &mut self,
        reader: &dyn OsReader,
        system_up_time: i64,
        system_active_ticks_delta: u64,
    ) {
        self.ram_mb = kb_to_mb(reader.process_ram_kb(self.pid));

        let up_time = system_up_time - self.start_time_after_boot;
        debug_assert!(
            up_time >= 0,
            "pid {} started after the current uptime ({} > {})",
            self.pid,
            self.start_time_after_boot,
            system_up_time
        );
        self.up_time = if up_time < 0 {
            warn!(
                "Clamping negative uptime {}s for pid {}",
                up_time, self.pid
            );
            0
        } else {
            up_time
        };

        let active_ticks = reader.process_active_ticks(self.pid);

        if active_ticks == 0 {
            self.ram_mb = 0;
            self.up_time = 0;
            self.cpu_utilization = 0.0;
        } else {
            if active_ticks < self.prev_active_ticks {
                debug!(
                    "Active ticks for pid {} went backwards ({} < {})",
                    self.pid, active_ticks, self.prev_active_ticks
                );
            }
            let delta = active_ticks.saturating_sub(self.prev_active_ticks);

            self.cpu_utilization = if system_active_ticks_delta == 0 {
                0.0
            } else {
                (delta as f64 / system_active_ticks_delta as f64) as f32
            };
        }

        self.prev_active_ticks = active_ticks;
    }
}

/// kB to MB, rounded to the nearest MB.
fn kb_to_mb(kb: i32) -> i32 {
    (f64::from(kb) / 1000.0).round() as i32
}
