//! Memory usage probes

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Raw memory sample in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Source of memory usage samples
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Samples the current process from `/proc/self/status`
///
/// Resident set size is reported as used memory and virtual size as total.
/// Platforms without procfs report zeros.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> MemorySample {
        match std::fs::read_to_string("/proc/self/status") {
            Ok(content) => parse_proc_status(&content),
            Err(e) => {
                debug!("Memory sample unavailable: {}", e);
                MemorySample::default()
            }
        }
    }
}

/// Parse `VmRSS` and `VmSize` (in kB) out of a procfs status file
pub fn parse_proc_status(content: &str) -> MemorySample {
    let mut sample = MemorySample::default();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            sample.used_bytes = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            sample.total_bytes = parse_kb(rest);
        }
    }
    sample
}

fn parse_kb(field: &str) -> u64 {
    field
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

/// Probe with values set by the caller
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    used: AtomicU64,
    total: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used: AtomicU64::new(used_bytes),
            total: AtomicU64::new(total_bytes),
        }
    }

    pub fn set_used(&self, used_bytes: u64) {
        self.used.store(used_bytes, Ordering::SeqCst);
    }

    pub fn set_total(&self, total_bytes: u64) {
        self.total.store(total_bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> MemorySample {
        MemorySample {
            used_bytes: self.used.load(Ordering::SeqCst),
            total_bytes: self.total.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_status() {
        let content = "Name:\tsteady\nVmPeak:\t  300000 kB\nVmSize:\t  204800 kB\nVmRSS:\t   10240 kB\nThreads:\t4\n";
        let sample = parse_proc_status(content);
        assert_eq!(sample.used_bytes, 10240 * 1024);
        assert_eq!(sample.total_bytes, 204800 * 1024);
    }

    #[test]
    fn test_parse_proc_status_missing_fields() {
        assert_eq!(parse_proc_status("Name:\tx\n"), MemorySample::default());
        assert_eq!(parse_proc_status("VmRSS:\tgarbage kB\n").used_bytes, 0);
    }

    #[test]
    fn test_fixed_probe() {
        let probe = FixedMemoryProbe::new(1, 2);
        probe.set_used(5);
        assert_eq!(
            probe.sample(),
            MemorySample {
                used_bytes: 5,
                total_bytes: 2
            }
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_probe_reports_rss() {
        let sample = ProcessMemoryProbe.sample();
        assert!(sample.used_bytes > 0);
    }
}
