//! Machine-wide CPU and memory samplers.

use tracing::{debug, warn};

use crate::reader::{CpuCounters, OsReader};

/// Something refreshed once per cycle that derives a utilization in `[0, 1]`.
pub trait Sampler {
    /// Reads fresh counters and recomputes the derived utilization.
    fn refresh(&mut self, reader: &dyn OsReader);

    fn utilization(&self) -> f32;
}

/// Derives CPU utilization from two successive samples of the tick counters.
///
/// The first refresh compares against a zero baseline, so its result only
/// reflects the average load since boot. Callers should expect one warm-up
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct CpuSampler {
    utilization: f32,
    prev_active_ticks: u64,
    prev_idle_ticks: u64,
    active_ticks_delta: u64,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives utilization from counters the caller already read.
    pub fn update(&mut self, counters: CpuCounters) {
        // counters only move backwards if the source failed and read as zero
        let idle_delta = counters.idle.saturating_sub(self.prev_idle_ticks);
        let active_delta = counters.active.saturating_sub(self.prev_active_ticks);
        let total_delta = idle_delta + active_delta;

        self.utilization = if total_delta == 0 {
            0.0
        } else {
            (active_delta as f64 / total_delta as f64) as f32
        };
        self.prev_idle_ticks = counters.idle;
        self.prev_active_ticks = counters.active;
        self.active_ticks_delta = active_delta;

        debug!(
            "CPU sample: active_delta={} idle_delta={} utilization={:.4}",
            active_delta, idle_delta, self.utilization
        );
    }

    /// Active ticks consumed machine-wide during the last interval.
    pub fn active_ticks_delta(&self) -> u64 {
        self.active_ticks_delta
    }
}

impl Sampler for CpuSampler {
    fn refresh(&mut self, reader: &dyn OsReader) {
        self.update(reader.cpu_counters());
    }

    fn utilization(&self) -> f32 {
        self.utilization
    }
}

/// Derives memory pressure from a single snapshot of the memory counters.
#[derive(Debug, Clone, Default)]
pub struct MemorySampler {
    utilization: f32,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sampler for MemorySampler {
    fn refresh(&mut self, reader: &dyn OsReader) {
        let fraction = reader.memory_counters().used_fraction();

        self.utilization = if (0.0..=1.0).contains(&fraction) {
            fraction as f32
        } else {
            warn!("Discarding out-of-range memory utilization {}", fraction);
            0.0
        };
    }

    fn utilization(&self) -> f32 {
        self.utilization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::mock::MockReader;
    use crate::reader::{CpuCounters, MemoryCounters};

    fn cpu(active: u64, idle: u64) -> CpuCounters {
        CpuCounters {
            total: active + idle,
            active,
            idle,
        }
    }

    #[test]
    fn test_cpu_first_refresh_uses_zero_baseline() {
        let reader = MockReader::new();
        reader.update(|s| s.cpu = cpu(300, 700));

        let mut sampler = CpuSampler::new();
        sampler.refresh(&reader);

        assert!((sampler.utilization() - 0.3).abs() < 1e-6);
        assert_eq!(sampler.active_ticks_delta(), 300);
    }

    #[test]
    fn test_cpu_delta_between_samples() {
        let reader = MockReader::new();
        let mut sampler = CpuSampler::new();

        reader.update(|s| s.cpu = cpu(1000, 9000));
        sampler.refresh(&reader);

        reader.update(|s| s.cpu = cpu(1075, 9025));
        sampler.refresh(&reader);

        assert!((sampler.utilization() - 0.75).abs() < 1e-6);
        assert_eq!(sampler.active_ticks_delta(), 75);
    }

    #[test]
    fn test_cpu_identical_samples_yield_zero() {
        let reader = MockReader::new();
        let mut sampler = CpuSampler::new();

        reader.update(|s| s.cpu = cpu(500, 500));
        sampler.refresh(&reader);
        sampler.refresh(&reader);

        assert_eq!(sampler.utilization(), 0.0);
        assert_eq!(sampler.active_ticks_delta(), 0);

        // and stays that way
        sampler.refresh(&reader);
        assert_eq!(sampler.utilization(), 0.0);
        assert_eq!(sampler.active_ticks_delta(), 0);
    }

    #[test]
    fn test_cpu_utilization_in_range() {
        let reader = MockReader::new();
        let mut sampler = CpuSampler::new();
        let samples = [(0, 0), (5, 0), (5, 10), (105, 10), (106, 1000), (2000, 1001)];

        for (active, idle) in samples {
            reader.update(|s| s.cpu = cpu(active, idle));
            sampler.refresh(&reader);
            let u = sampler.utilization();
            assert!((0.0..=1.0).contains(&u), "utilization {u} out of range");
        }
    }

    #[test]
    fn test_cpu_unavailable_source_degrades_to_zero() {
        let reader = MockReader::new();
        let mut sampler = CpuSampler::new();

        reader.update(|s| s.cpu = cpu(100, 100));
        sampler.refresh(&reader);
        reader.update(|s| s.cpu = CpuCounters::default());
        sampler.refresh(&reader);

        assert_eq!(sampler.utilization(), 0.0);
        assert_eq!(sampler.active_ticks_delta(), 0);
    }

    #[test]
    fn test_memory_utilization() {
        let reader = MockReader::new();
        reader.update(|s| {
            s.memory = MemoryCounters {
                total: 1000,
                free: 250,
                buffers: 50,
                cached: 100,
                reclaimable: 0,
                shared: 0,
            }
        });

        let mut sampler = MemorySampler::new();
        sampler.refresh(&reader);

        assert!((sampler.utilization() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_memory_out_of_range_resets_to_zero() {
        let reader = MockReader::new();
        let mut sampler = MemorySampler::new();

        reader.update(|s| {
            s.memory = MemoryCounters {
                total: 1000,
                free: 500,
                ..Default::default()
            }
        });
        sampler.refresh(&reader);
        assert!((sampler.utilization() - 0.5).abs() < 1e-6);

        // more free than total
        reader.update(|s| {
            s.memory = MemoryCounters {
                total: 1000,
                free: 2000,
                ..Default::default()
            }
        });
        sampler.refresh(&reader);
        assert_eq!(sampler.utilization(), 0.0);
    }

    #[test]
    fn test_memory_zero_total_resets_to_zero() {
        let reader = MockReader::new();
        let mut sampler = MemorySampler::new();
        sampler.refresh(&reader);
        assert_eq!(sampler.utilization(), 0.0);
    }

    #[test]
    fn test_samplers_behind_trait_object() {
        let reader = MockReader::new();
        reader.update(|s| {
            s.cpu = cpu(1, 3);
            s.memory = MemoryCounters {
                total: 4,
                free: 1,
                ..Default::default()
            };
        });

        let mut samplers: Vec<Box<dyn Sampler>> =
            vec![Box::new(CpuSampler::new()), Box::new(MemorySampler::new())];
        for sampler in samplers.iter_mut() {
            sampler.refresh(&reader);
        }

        assert!((samplers[0].utilization() - 0.25).abs() < 1e-6);
        assert!((samplers[1].utilization() - 0.75).abs() < 1e-6);
    }
}
