//! Sampling and derivation engine for herakles-proc-top.
//!
//! This crate turns raw, cumulative `/proc` counters (jiffies, VmSize,
//! process start ticks) into point-in-time rates and keeps a deduplicated
//! registry of the processes observed across refresh cycles. The terminal
//! dashboard in the binary only consumes what is exposed here.

pub mod format;
pub mod process;
pub mod procfs;
pub mod reader;
pub mod registry;
pub mod sampler;
pub mod users;

pub use process::ProcessEntry;
pub use procfs::ProcFs;
pub use reader::{CpuCounters, MemoryCounters, OsReader, SystemCounters};
pub use registry::{ProcessOrder, ProcessRegistry, ProcessView, RegistrySnapshot};
pub use sampler::{CpuSampler, MemorySampler, Sampler};
pub use users::UidNameCache;
