//! Process resource sampling

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Memory figures for the current process
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Resident set size in bytes
    pub resident_bytes: u64,

    /// Virtual memory size in bytes
    pub virtual_bytes: u64,
}

impl MemoryUsage {
    /// Resident memory in megabytes
    pub fn resident_mb(&self) -> f64 {
        self.resident_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// A single resource sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub memory: MemoryUsage,

    /// CPU usage as a percentage of total host capacity
    pub cpu_percent: f64,
}

/// Source of process resource figures
pub trait ResourceProbe: Send + Sync {
    /// Take a fresh sample
    fn sample(&self) -> ResourceSample;
}

/// Probe backed by `sysinfo`, reading the current process only
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    cores: f64,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            cores: num_cpus::get().max(1) as f64,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&self) -> ResourceSample {
        let Some(pid) = self.pid else {
            return ResourceSample::default();
        };

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory().with_cpu(),
        );

        match system.process(pid) {
            Some(process) => ResourceSample {
                memory: MemoryUsage {
                    resident_bytes: process.memory(),
                    virtual_bytes: process.virtual_memory(),
                },
                // sysinfo reports per-core percent, so 100% means one full core
                cpu_percent: process.cpu_usage() as f64 / self.cores,
            },
            None => ResourceSample::default(),
        }
    }
}

/// Probe returning a fixed sample
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProbe(pub ResourceSample);

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> ResourceSample {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_probe_sample_is_finite() {
        let probe = SysinfoProbe::new();
        let sample = probe.sample();
        assert!(sample.cpu_percent >= 0.0);
        assert!(sample.cpu_percent.is_finite());
    }

    #[test]
    fn test_resident_mb() {
        let memory = MemoryUsage {
            resident_bytes: 256 * 1024 * 1024,
            virtual_bytes: 0,
        };
        assert_eq!(memory.resident_mb(), 256.0);
    }
}
