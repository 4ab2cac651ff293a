//! Incremental message processing
//!
//! Large messages are split into bounded chunks, queued, and drained a small
//! batch per tick so that consumers are never flooded by one huge payload.

pub mod chunk;
pub mod queue;
pub mod registry;
pub mod service;
pub mod stats;
pub mod types;

pub use chunk::{message_type_of, split_message, split_typed_message, MessageChunk};
pub use queue::ChunkQueue;
pub use registry::{ChunkHandler, FnHandler, ProcessorRegistry, DEFAULT_PROCESSOR};
pub use service::IncrementalProcessor;
pub use stats::ProcessingStats;
pub use types::{ProcessorConfig, ProcessorConfigUpdate, ProcessorState};
