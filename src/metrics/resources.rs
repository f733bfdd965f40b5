// CPU and memory sampling for per-request resource usage

use chrono::Utc;
use std::time::Duration;
use sysinfo::System;

use super::types::ResourceSample;
use crate::errors::{Result, TelemetryError};

/// Source of CPU/memory readings taken once per recorded request.
///
/// Sampling may block for the probe's interval, so the aggregator calls it
/// before taking its lock.
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> Result<ResourceSample>;
}

/// Reads host-wide CPU and memory usage through sysinfo
#[derive(Debug, Clone)]
pub struct SystemProbe {
    interval: Duration,
}

impl SystemProbe {
    /// Intervals shorter than `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` are
    /// raised to it; sysinfo skips the second CPU refresh otherwise.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
    }
}

impl ResourceProbe for SystemProbe {
    fn sample(&self) -> Result<ResourceSample> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(TelemetryError::Sampling(
                "platform not supported by sysinfo".to_string(),
            ));
        }

        // CPU usage is a delta between two refreshes
        let mut system = System::new();
        system.refresh_cpu_usage();
        std::thread::sleep(self.interval);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(TelemetryError::Sampling(
                "total memory reported as zero".to_string(),
            ));
        }
        let used = system.used_memory();

        Ok(ResourceSample {
            timestamp: Utc::now(),
            cpu_percent: f64::from(system.global_cpu_usage()),
            memory_percent: used as f64 / total as f64 * 100.0,
            memory_used_mb: used as f64 / (1024.0 * 1024.0),
        })
    }
}

/// Probe that never samples; used when resource tracking is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

impl ResourceProbe for NoopProbe {
    fn sample(&self) -> Result<ResourceSample> {
        Err(TelemetryError::Sampling("resource sampling disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_probe_reads_memory() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let sample = SystemProbe::new(Duration::ZERO).sample().unwrap();
        assert!(sample.memory_percent > 0.0 && sample.memory_percent <= 100.0);
        assert!(sample.memory_used_mb > 0.0);
        assert!(sample.cpu_percent >= 0.0);
    }

    #[test]
    fn test_interval_never_below_cpu_minimum() {
        let minimum = sysinfo::MINIMUM_CPU_UPDATE_INTERVAL;
        assert_eq!(SystemProbe::new(Duration::ZERO).interval(), minimum);
        assert!(SystemProbe::new(Duration::from_millis(100)).interval() >= minimum);
        assert!(SystemProbe::default().interval() >= minimum);
        assert_eq!(
            SystemProbe::new(Duration::from_secs(1)).interval(),
            Duration::from_secs(1).max(minimum)
        );
    }

    #[test]
    fn test_noop_probe_fails() {
        assert!(matches!(NoopProbe.sample(), Err(TelemetryError::Sampling(_))));
    }
}
