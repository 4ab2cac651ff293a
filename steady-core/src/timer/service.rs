//! Named timeout timers backed by tokio tasks

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use super::types::{TimerConfig, TimerInfo, TimerStats};

/// Callback run when a timer expires
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Tracks countdown timers by id and runs their callbacks on expiry
///
/// Timer ids are `timer_<n>` with `n` counting from 1 per service.
pub struct TimerService {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    timers: Mutex<HashMap<String, ActiveTimer>>,
    counter: AtomicU64,
    generation: AtomicU64,
}

struct ActiveTimer {
    config: TimerConfig,
    callback: TimerCallback,
    started_at: Instant,
    generation: u64,
    task: JoinHandle<()>,
}

enum AfterFire {
    Rearm,
    Done,
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimerInner {
                timers: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start a new timer and return its id
    pub fn start_timer<F>(&self, config: TimerConfig, on_timeout: F) -> crate::Result<String>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| crate::Error::Runtime(format!("cannot start timer: {}", e)))?;

        let id = format!("timer_{}", self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1);
        let callback: TimerCallback = Arc::new(on_timeout);

        let mut timers = self.inner.timers.lock();
        let timer = self.inner.arm(&runtime, &id, config, callback);
        if let Some(name) = &timer.config.name {
            debug!("Timer started: {} ({}) - {}ms", name, id, timer.config.duration_ms);
        }
        timers.insert(id.clone(), timer);
        Ok(id)
    }

    /// Stop and remove a timer
    pub fn stop_timer(&self, timer_id: &str) -> bool {
        match self.inner.timers.lock().remove(timer_id) {
            Some(timer) => {
                timer.task.abort();
                if let Some(name) = &timer.config.name {
                    debug!("Timer stopped: {} ({})", name, timer_id);
                }
                true
            }
            None => false,
        }
    }

    /// Reset a timer's countdown
    pub fn restart_timer(&self, timer_id: &str) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        let mut timers = self.inner.timers.lock();
        let Some(old) = timers.remove(timer_id) else {
            return false;
        };
        old.task.abort();

        let timer = self.inner.arm(&runtime, timer_id, old.config, old.callback);
        if let Some(name) = &timer.config.name {
            debug!("Timer restarted: {} ({})", name, timer_id);
        }
        timers.insert(timer_id.to_string(), timer);
        true
    }

    pub fn has_timer(&self, timer_id: &str) -> bool {
        self.inner.timers.lock().contains_key(timer_id)
    }

    /// Time left before the timer fires
    pub fn remaining_time(&self, timer_id: &str) -> Option<Duration> {
        self.inner
            .timers
            .lock()
            .get(timer_id)
            .map(ActiveTimer::remaining)
    }

    pub fn active_timer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.timers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop every timer
    pub fn clear_all_timers(&self) {
        let mut timers = self.inner.timers.lock();
        for (id, timer) in timers.drain() {
            timer.task.abort();
            if let Some(name) = &timer.config.name {
                debug!("Timer cleared: {} ({})", name, id);
            }
        }
    }

    pub fn stats(&self) -> TimerStats {
        let timers = self.inner.timers.lock();
        let mut infos: Vec<TimerInfo> = timers
            .iter()
            .map(|(id, timer)| TimerInfo {
                id: id.clone(),
                name: timer
                    .config
                    .name
                    .clone()
                    .unwrap_or_else(|| "unnamed".to_string()),
                duration_ms: timer.config.duration_ms,
                remaining_ms: timer.remaining().as_millis() as u64,
                auto_restart: timer.config.auto_restart,
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));

        TimerStats {
            active_count: infos.len(),
            timers: infos,
        }
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.clear_all_timers();
    }
}

impl ActiveTimer {
    fn remaining(&self) -> Duration {
        self.config.duration().saturating_sub(self.started_at.elapsed())
    }
}

impl TimerInner {
    fn arm(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        id: &str,
        config: TimerConfig,
        callback: TimerCallback,
    ) -> ActiveTimer {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let task = runtime.spawn(run_timer(
            Arc::downgrade(self),
            id.to_string(),
            generation,
            config.duration(),
            Arc::clone(&callback),
        ));

        ActiveTimer {
            config,
            callback,
            started_at: Instant::now(),
            generation,
            task,
        }
    }

    /// Whether `id` is still armed by the task that owns `generation`
    fn is_current(&self, id: &str, generation: u64) -> bool {
        self.timers
            .lock()
            .get(id)
            .is_some_and(|t| t.generation == generation)
    }

    fn after_fire(&self, id: &str, generation: u64) -> AfterFire {
        let mut timers = self.timers.lock();
        match timers.get_mut(id) {
            Some(timer) if timer.generation == generation => {
                if timer.config.auto_restart {
                    timer.started_at = Instant::now();
                    AfterFire::Rearm
                } else {
                    timers.remove(id);
                    AfterFire::Done
                }
            }
            _ => AfterFire::Done,
        }
    }
}

async fn run_timer(
    inner: Weak<TimerInner>,
    id: String,
    generation: u64,
    duration: Duration,
    callback: TimerCallback,
) {
    loop {
        tokio::time::sleep(duration).await;

        let Some(service) = inner.upgrade() else {
            return;
        };
        if !service.is_current(&id, generation) {
            return;
        }

        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            error!("Timer {} callback panicked", id);
        }

        match service.after_fire(&id, generation) {
            AfterFire::Rearm => continue,
            AfterFire::Done => return,
        }
    }
}
