//! Memory pressure monitoring
//!
//! Samples memory usage, classifies it into pressure levels and runs the
//! cleanup callbacks registered for each level.

pub mod probe;
pub mod service;
pub mod types;

pub use probe::{FixedMemoryProbe, MemoryProbe, MemorySample, ProcessMemoryProbe};
pub use service::{MemoryMonitor, PressureCallback};
pub use types::{
    bytes_to_megabytes, MemoryConfig, MemoryPressureLevel, MemoryStats, MemoryUsageInfo,
    PressureThresholds, ThresholdsMb,
};
