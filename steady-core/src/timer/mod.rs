//! Timer service for UI timeouts and periodic health checks

pub mod service;
pub mod types;

pub use service::{TimerCallback, TimerService};
pub use types::{TimerConfig, TimerInfo, TimerStats};
