//! Core services for keeping a UI responsive under heavy message load
//!
//! This crate splits large messages into chunks and drains them on a fixed
//! cadence, watches process memory pressure, runs named timers and trims
//! message histories to a bounded window.

pub mod config;
pub mod error;
pub mod logging;
pub mod pressure;
pub mod processor;
pub mod timer;
pub mod utils;
pub mod window;

pub use error::{Error, Result};
pub use pressure::{MemoryMonitor, MemoryPressureLevel};
pub use processor::{IncrementalProcessor, MessageChunk, ProcessingStats, ProcessorConfig};
pub use timer::{TimerConfig, TimerService};
pub use window::recent_window;
