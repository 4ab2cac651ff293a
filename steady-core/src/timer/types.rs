//! Timer configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest countdown a timer will actually wait
pub const MIN_TIMER_DURATION: Duration = Duration::from_millis(1);

/// Timer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Countdown length in milliseconds
    pub duration_ms: u64,
    /// Re-arm with the same id after firing
    #[serde(default)]
    pub auto_restart: bool,
    /// Optional name for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TimerConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            auto_restart: false,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    /// Countdown length, never shorter than [`MIN_TIMER_DURATION`]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms).max(MIN_TIMER_DURATION)
    }

    /// API response timeout, 30 seconds
    pub fn api_response() -> Self {
        Self::new(Duration::from_secs(30)).named("API Response Timeout")
    }

    /// UI activity timeout, 5 minutes
    pub fn ui_activity() -> Self {
        Self::new(Duration::from_secs(300)).named("UI Activity Timeout")
    }

    /// Message processing timeout, 10 seconds
    pub fn message_processing() -> Self {
        Self::new(Duration::from_secs(10)).named("Message Processing Timeout")
    }

    /// Connection health check, every 30 seconds
    pub fn connection_health() -> Self {
        Self::new(Duration::from_secs(30))
            .named("Connection Health Check")
            .auto_restart(true)
    }
}

/// Per-timer details reported by [`TimerStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    pub remaining_ms: u64,
    pub auto_restart: bool,
}

/// Snapshot of the active timers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStats {
    pub active_count: usize,
    pub timers: Vec<TimerInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(TimerConfig::api_response().duration_ms, 30_000);
        assert_eq!(TimerConfig::ui_activity().duration(), Duration::from_secs(300));
        assert_eq!(TimerConfig::message_processing().duration_ms, 10_000);

        let health = TimerConfig::connection_health();
        assert!(health.auto_restart);
        assert_eq!(health.name.as_deref(), Some("Connection Health Check"));
    }

    #[test]
    fn test_builder() {
        let config = TimerConfig::new(Duration::from_millis(250)).named("poll");
        assert_eq!(config.duration_ms, 250);
        assert!(!config.auto_restart);
        assert_eq!(config.name.as_deref(), Some("poll"));
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let config = TimerConfig::new(Duration::ZERO).auto_restart(true);
        assert_eq!(config.duration_ms, 0);
        assert_eq!(config.duration(), MIN_TIMER_DURATION);
    }
}
