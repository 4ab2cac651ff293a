//! Processor registry mapping message types to chunk handlers

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::chunk::MessageChunk;

/// Reserved message type used when no exact match is registered
pub const DEFAULT_PROCESSOR: &str = "default";

/// Handles the chunks of one message type
#[async_trait]
pub trait ChunkHandler: Send + Sync {
    /// Process a single chunk
    async fn handle(&self, chunk: MessageChunk) -> crate::Result<()>;
}

type BoxedHandlerFn = Arc<
    dyn Fn(MessageChunk) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send>> + Send + Sync,
>;

/// Adapts an async closure into a [`ChunkHandler`]
pub struct FnHandler {
    f: BoxedHandlerFn,
}

impl FnHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(MessageChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |chunk| Box::pin(f(chunk))),
        }
    }
}

#[async_trait]
impl ChunkHandler for FnHandler {
    async fn handle(&self, chunk: MessageChunk) -> crate::Result<()> {
        (self.f)(chunk).await
    }
}

/// Registry of chunk handlers keyed by message type
pub struct ProcessorRegistry {
    handlers: HashMap<String, Arc<dyn ChunkHandler>>,
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the type
    pub fn register(&mut self, message_type: impl Into<String>, handler: Arc<dyn ChunkHandler>) {
        self.handlers.insert(message_type.into(), handler);
    }

    /// Unregister the handler for a type, returning whether one existed
    pub fn unregister(&mut self, message_type: &str) -> bool {
        self.handlers.remove(message_type).is_some()
    }

    /// Resolve the handler for a type, falling back to [`DEFAULT_PROCESSOR`]
    pub fn resolve(&self, message_type: &str) -> Option<Arc<dyn ChunkHandler>> {
        self.handlers
            .get(message_type)
            .or_else(|| self.handlers.get(DEFAULT_PROCESSOR))
            .cloned()
    }

    /// Check if a handler is registered for exactly this type
    pub fn has(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Get list of registered message types
    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
