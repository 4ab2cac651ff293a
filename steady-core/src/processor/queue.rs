//! FIFO queue of chunks awaiting dispatch

use std::collections::VecDeque;

use super::chunk::MessageChunk;

/// Ordered queue of pending chunks
///
/// Chunks are appended at the tail on enqueue and removed from the head in
/// batches when the scheduler drains.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<MessageChunk>,
}

impl ChunkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
        }
    }

    /// Append the chunks of one message, preserving their order
    pub fn push_all(&mut self, chunks: impl IntoIterator<Item = MessageChunk>) {
        self.chunks.extend(chunks);
    }

    /// Remove up to `max` chunks from the head
    pub fn take_batch(&mut self, max: usize) -> Vec<MessageChunk> {
        let count = max.min(self.chunks.len());
        self.chunks.drain(..count).collect()
    }

    /// Drop every pending chunk, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.chunks.len();
        self.chunks.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Peek at the next chunk to be dispatched
    pub fn front(&self) -> Option<&MessageChunk> {
        self.chunks.front()
    }
}
