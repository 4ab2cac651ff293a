//! Incremental message processor: chunked queue drained on a timer

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::chunk::{message_type_of, split_typed_message, MessageChunk};
use super::queue::ChunkQueue;
use super::registry::{ChunkHandler, FnHandler, ProcessorRegistry};
use super::stats::ProcessingStats;
use super::types::{ProcessorConfig, ProcessorConfigUpdate, ProcessorState};

/// Breaks large messages into chunks and feeds them to handlers a few at a
/// time, so a single huge message never monopolizes the consumer.
///
/// The processor is caller-owned: construct as many as needed. Ticks are
/// driven by a tokio task spawned in [`start`](Self::start).
pub struct IncrementalProcessor {
    shared: Arc<Shared>,
    ticker: Mutex<Option<Ticker>>,
}

struct Ticker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Shared {
    config: RwLock<ProcessorConfig>,
    queue: Mutex<ChunkQueue>,
    registry: RwLock<ProcessorRegistry>,
    stats: Mutex<ProcessingStats>,
    draining: AtomicBool,
}

/// Releases the drain slot even if the batch future is dropped midway
struct DrainSlot<'a>(&'a AtomicBool);

impl Drop for DrainSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IncrementalProcessor {
    /// Create a stopped processor with the given configuration
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                queue: Mutex::new(ChunkQueue::new()),
                registry: RwLock::new(ProcessorRegistry::new()),
                stats: Mutex::new(ProcessingStats::default()),
                draining: AtomicBool::new(false),
            }),
            ticker: Mutex::new(None),
        }
    }

    /// Start the tick task on the current tokio runtime
    ///
    /// Calling this while a tick task exists does nothing.
    pub fn start(&self) -> crate::Result<()> {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            debug!("Incremental processor already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| crate::Error::Runtime(format!("cannot start processor: {}", e)))?;

        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_loop(Arc::clone(&self.shared), cancel.clone()));
        *ticker = Some(Ticker { cancel, task });

        let config = self.shared.config.read();
        info!(
            max_chunk_size = config.max_chunk_size,
            processing_interval_ms = config.processing_interval_ms,
            max_messages_per_interval = config.max_messages_per_interval,
            "Incremental processor started"
        );
        Ok(())
    }

    /// Stop ticking and discard every pending chunk
    ///
    /// A batch already being dispatched runs to completion.
    pub fn stop(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.cancel.cancel();
        }

        let dropped = self.shared.clear_queue();
        info!(dropped_chunks = dropped, "Incremental processor stopped");
    }

    /// Stop and wait for the tick task, including any in-flight batch
    pub async fn shutdown(&self) {
        let ticker = self.ticker.lock().take();
        self.shared.clear_queue();

        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            if let Err(e) = ticker.task.await {
                warn!("Processor task ended abnormally: {}", e);
            }
        }
        info!("Incremental processor shut down");
    }

    /// Queue a message routed by its id prefix (text before the first `_`)
    ///
    /// Returns the number of chunks produced.
    pub fn queue_message(&self, message_id: &str, content: &str) -> usize {
        self.queue_typed_message(message_type_of(message_id), message_id, content)
    }

    /// Queue a message with an explicit routing type
    pub fn queue_typed_message(&self, message_type: &str, message_id: &str, content: &str) -> usize {
        let (max_chunk_size, debug_mode) = {
            let config = self.shared.config.read();
            (config.max_chunk_size, config.debug_mode)
        };

        let chunks = split_typed_message(message_type, message_id, content, max_chunk_size);
        let count = chunks.len();

        {
            let mut queue = self.shared.queue.lock();
            queue.push_all(chunks);
            self.shared.stats.lock().record_enqueue(queue.len());
        }

        if debug_mode {
            debug!(message_id, message_type, chunks = count, "Queued message");
        }
        count
    }

    /// Register an async closure as the processor for a message type
    pub fn register_processor<F, Fut>(&self, message_type: impl Into<String>, processor: F)
    where
        F: Fn(MessageChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        self.register_handler(message_type, Arc::new(FnHandler::new(processor)));
    }

    /// Register a handler object for a message type
    pub fn register_handler(&self, message_type: impl Into<String>, handler: Arc<dyn ChunkHandler>) {
        let message_type = message_type.into();
        if self.shared.config.read().debug_mode {
            debug!(message_type = %message_type, "Registered processor");
        }
        self.shared.registry.write().register(message_type, handler);
    }

    /// Remove the processor for a message type
    pub fn unregister_processor(&self, message_type: &str) -> bool {
        let removed = self.shared.registry.write().unregister(message_type);
        if self.shared.config.read().debug_mode {
            debug!(message_type, removed, "Unregistered processor");
        }
        removed
    }

    /// Check if a processor is registered for exactly this type
    pub fn has_processor(&self, message_type: &str) -> bool {
        self.shared.registry.read().has(message_type)
    }

    /// Registered message types, sorted
    pub fn processor_types(&self) -> Vec<String> {
        self.shared.registry.read().message_types()
    }

    /// Snapshot of the processing statistics
    pub fn stats(&self) -> ProcessingStats {
        self.shared.stats.lock().clone()
    }

    /// Drop every queued chunk without changing the scheduler state
    pub fn clear_queue(&self) {
        let dropped = self.shared.clear_queue();
        if self.shared.config.read().debug_mode {
            debug!(dropped_chunks = dropped, "Queue cleared");
        }
    }

    /// Merge a partial update into the configuration
    ///
    /// The new values apply from the next tick; chunks already queued keep
    /// their original split.
    pub fn update_config(&self, update: ProcessorConfigUpdate) -> crate::Result<()> {
        let mut config = self.shared.config.write();
        let mut candidate = config.clone();
        candidate.apply(&update);

        let errors = candidate.validation_errors("processor");
        if !errors.is_empty() {
            return Err(crate::Error::Validation(errors.join("; ")));
        }

        *config = candidate;
        if config.debug_mode {
            debug!("Processor config updated: {:?}", *config);
        }
        Ok(())
    }

    /// Current configuration
    pub fn config(&self) -> ProcessorConfig {
        self.shared.config.read().clone()
    }

    /// Run a single tick now, returning the number of chunks dispatched
    ///
    /// Returns 0 when another batch is in progress or the queue is empty.
    pub async fn drain_once(&self) -> usize {
        self.shared.drain_once().await
    }

    /// Whether a batch is currently being dispatched
    pub fn is_processing(&self) -> bool {
        self.shared.draining.load(Ordering::Acquire)
    }

    /// Whether the tick task is registered
    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }

    pub fn state(&self) -> ProcessorState {
        if !self.is_running() {
            ProcessorState::Stopped
        } else if self.is_processing() {
            ProcessorState::Draining
        } else {
            ProcessorState::Running
        }
    }

    pub fn pending_chunks(&self) -> usize {
        self.shared.queue.lock().len()
    }
}

impl Default for IncrementalProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl Drop for IncrementalProcessor {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.cancel.cancel();
        }
    }
}

impl Shared {
    fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.clear();
        self.stats.lock().pending_chunks = 0;
        dropped
    }

    async fn drain_once(&self) -> usize {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        let _slot = DrainSlot(&self.draining);

        let (batch_size, debug_mode) = {
            let config = self.config.read();
            (config.max_messages_per_interval, config.debug_mode)
        };

        let batch = self.queue.lock().take_batch(batch_size);
        if batch.is_empty() {
            return 0;
        }

        let started = Instant::now();
        let count = batch.len();
        for chunk in batch {
            self.dispatch(chunk, debug_mode).await;
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let pending = {
            let queue = self.queue.lock();
            self.stats.lock().record_batch(count, queue.len(), elapsed_ms);
            queue.len()
        };

        if debug_mode {
            debug!(chunks = count, pending, elapsed_ms, "Processed batch");
        }
        count
    }

    async fn dispatch(&self, chunk: MessageChunk, debug_mode: bool) {
        let handler = self.registry.read().resolve(&chunk.message_type);
        let Some(handler) = handler else {
            if debug_mode {
                debug!(
                    chunk_id = %chunk.id,
                    message_type = %chunk.message_type,
                    "No processor found, dropping chunk"
                );
            }
            return;
        };

        let chunk_id = chunk.id.clone();
        match AssertUnwindSafe(handler.handle(chunk)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(chunk_id = %chunk_id, "Error processing chunk: {}", e),
            Err(_) => error!(chunk_id = %chunk_id, "Chunk processor panicked"),
        }
    }
}

/// Fixed-delay ticking: each sleep starts after the previous batch finished,
/// so a slow batch stretches the period instead of queueing extra ticks.
async fn run_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let interval = shared.config.read().processing_interval();

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        shared.drain_once().await;
    }
    debug!("Processor tick loop exited");
}
