//! Processing statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of processor counters
///
/// Always handed out by value; mutating a snapshot never affects the
/// processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Messages queued since construction
    pub total_messages: u64,
    /// Chunks dispatched since construction
    pub processed_messages: u64,
    /// Chunks currently waiting in the queue
    pub pending_chunks: usize,
    /// Wall-clock duration of the last batch
    pub processing_time_ms: f64,
    /// When the last batch finished
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl ProcessingStats {
    pub(crate) fn record_enqueue(&mut self, pending: usize) {
        self.total_messages += 1;
        self.pending_chunks = pending;
    }

    pub(crate) fn record_batch(&mut self, processed: usize, pending: usize, elapsed_ms: f64) {
        self.processed_messages += processed as u64;
        self.pending_chunks = pending;
        self.processing_time_ms = elapsed_ms;
        self.last_processed_at = Some(Utc::now());
    }
}
