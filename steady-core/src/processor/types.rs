//! Incremental processor configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default chunk size in characters (1K)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Default tick interval, roughly one frame at 60fps
pub const DEFAULT_PROCESSING_INTERVAL_MS: u64 = 16;

/// Default batch cap per tick
pub const DEFAULT_MAX_MESSAGES_PER_INTERVAL: usize = 5;

/// Incremental processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Tick interval in milliseconds
    #[serde(default = "default_processing_interval_ms")]
    pub processing_interval_ms: u64,
    /// Maximum chunks dispatched per tick
    #[serde(default = "default_max_messages_per_interval")]
    pub max_messages_per_interval: usize,
    /// Emit per-chunk diagnostics
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::BALANCED
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_processing_interval_ms() -> u64 {
    DEFAULT_PROCESSING_INTERVAL_MS
}

fn default_max_messages_per_interval() -> usize {
    DEFAULT_MAX_MESSAGES_PER_INTERVAL
}

impl ProcessorConfig {
    /// Fast hardware
    pub const HIGH_PERFORMANCE: Self = Self {
        max_chunk_size: 2000,
        processing_interval_ms: 8,
        max_messages_per_interval: 10,
        debug_mode: false,
    };

    /// Default for most situations
    pub const BALANCED: Self = Self {
        max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        processing_interval_ms: DEFAULT_PROCESSING_INTERVAL_MS,
        max_messages_per_interval: DEFAULT_MAX_MESSAGES_PER_INTERVAL,
        debug_mode: false,
    };

    /// Slower hardware or high memory pressure
    pub const CONSERVATIVE: Self = Self {
        max_chunk_size: 500,
        processing_interval_ms: 33,
        max_messages_per_interval: 3,
        debug_mode: false,
    };

    /// Look up a preset by name (case-insensitive, `-` or `_` separated)
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "high_performance" => Some(Self::HIGH_PERFORMANCE),
            "balanced" => Some(Self::BALANCED),
            "conservative" => Some(Self::CONSERVATIVE),
            _ => None,
        }
    }

    pub fn processing_interval(&self) -> Duration {
        Duration::from_millis(self.processing_interval_ms)
    }

    /// Merge a partial update into this config
    pub fn apply(&mut self, update: &ProcessorConfigUpdate) {
        if let Some(v) = update.max_chunk_size {
            self.max_chunk_size = v;
        }
        if let Some(v) = update.processing_interval_ms {
            self.processing_interval_ms = v;
        }
        if let Some(v) = update.max_messages_per_interval {
            self.max_messages_per_interval = v;
        }
        if let Some(v) = update.debug_mode {
            self.debug_mode = v;
        }
    }

    /// Collect violations, prefixing field names with `scope`
    pub fn validation_errors(&self, scope: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_chunk_size == 0 {
            errors.push(format!("{}.max_chunk_size must be > 0", scope));
        }
        if self.processing_interval_ms == 0 {
            errors.push(format!("{}.processing_interval_ms must be > 0", scope));
        }
        if self.max_messages_per_interval == 0 {
            errors.push(format!("{}.max_messages_per_interval must be > 0", scope));
        }
        errors
    }
}

/// Partial processor configuration for [`ProcessorConfig::apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages_per_interval: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<bool>,
}

/// Lifecycle state of the drain scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    /// No tick task registered
    Stopped,
    /// Tick task active, idle between ticks
    Running,
    /// A batch is being dispatched
    Draining,
}
