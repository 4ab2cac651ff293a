//! Memory pressure types and thresholds

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Default sampling interval: 30 seconds
pub const DEFAULT_MEMORY_CHECK_INTERVAL_S: u64 = 30;

/// Consecutive high samples that trigger an emergency cleanup
pub const DEFAULT_EMERGENCY_AFTER: u32 = 3;

/// Coarse classification of memory usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressureLevel {
    Normal,
    Moderate,
    High,
    Critical,
}

impl MemoryPressureLevel {
    /// High or critical
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for MemoryPressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Used-memory thresholds in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureThresholds {
    /// Start gentle cleanup
    #[serde(default = "default_moderate")]
    pub moderate_bytes: u64,
    /// Aggressive cleanup
    #[serde(default = "default_high")]
    pub high_bytes: u64,
    /// Emergency cleanup
    #[serde(default = "default_critical")]
    pub critical_bytes: u64,
}

fn default_moderate() -> u64 {
    50 * MIB
}

fn default_high() -> u64 {
    100 * MIB
}

fn default_critical() -> u64 {
    150 * MIB
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            moderate_bytes: default_moderate(),
            high_bytes: default_high(),
            critical_bytes: default_critical(),
        }
    }
}

impl PressureThresholds {
    /// Classify a used-bytes sample
    pub fn level_for(&self, used_bytes: u64) -> MemoryPressureLevel {
        if used_bytes >= self.critical_bytes {
            MemoryPressureLevel::Critical
        } else if used_bytes >= self.high_bytes {
            MemoryPressureLevel::High
        } else if used_bytes >= self.moderate_bytes {
            MemoryPressureLevel::Moderate
        } else {
            MemoryPressureLevel::Normal
        }
    }

    pub fn in_megabytes(&self) -> ThresholdsMb {
        ThresholdsMb {
            moderate: bytes_to_megabytes(self.moderate_bytes),
            high: bytes_to_megabytes(self.high_bytes),
            critical: bytes_to_megabytes(self.critical_bytes),
        }
    }
}

/// Memory monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether background sampling is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between samples
    #[serde(default = "default_interval")]
    pub interval_s: u64,
    /// Consecutive high samples before an emergency cleanup
    #[serde(default = "default_emergency_after")]
    pub emergency_after: u32,
    #[serde(default)]
    pub thresholds: PressureThresholds,
}

impl MemoryConfig {
    /// Time between samples, never shorter than one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s.max(1))
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: DEFAULT_MEMORY_CHECK_INTERVAL_S,
            emergency_after: DEFAULT_EMERGENCY_AFTER,
            thresholds: PressureThresholds::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    DEFAULT_MEMORY_CHECK_INTERVAL_S
}

fn default_emergency_after() -> u32 {
    DEFAULT_EMERGENCY_AFTER
}

/// One memory sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsageInfo {
    pub heap_used_mb: f64,
    pub heap_total_mb: f64,
    pub pressure_level: MemoryPressureLevel,
    pub timestamp: DateTime<Utc>,
}

/// Thresholds expressed in megabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsMb {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

/// Monitor status for debugging and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(flatten)]
    pub info: MemoryUsageInfo,
    pub is_monitoring: bool,
    pub callback_count: usize,
    pub consecutive_high_pressure: u32,
    pub thresholds: ThresholdsMb,
}

/// Convert bytes to megabytes rounded to two decimals
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    ((bytes as f64 / MIB as f64) * 100.0).round() / 100.0
}
