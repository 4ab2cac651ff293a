//! Memory pressure monitor with cleanup callbacks

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::MemoryProbe;
use super::types::{
    bytes_to_megabytes, MemoryConfig, MemoryPressureLevel, MemoryStats, MemoryUsageInfo,
};

/// Cleanup callback invoked with the sample that triggered it
pub type PressureCallback = Arc<
    dyn Fn(MemoryUsageInfo) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Periodically samples memory and runs cleanup callbacks when the pressure
/// level changes or stays high for too long.
pub struct MemoryMonitor {
    state: Arc<MonitorState>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

struct MonitorState {
    config: MemoryConfig,
    probe: Arc<dyn MemoryProbe>,
    callbacks: RwLock<Vec<(MemoryPressureLevel, PressureCallback)>>,
    last_level: Mutex<MemoryPressureLevel>,
    consecutive_high: AtomicU32,
}

impl MemoryMonitor {
    /// Create a monitor sampling through `probe`
    pub fn new(config: MemoryConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            state: Arc::new(MonitorState {
                config,
                probe,
                callbacks: RwLock::new(Vec::new()),
                last_level: Mutex::new(MemoryPressureLevel::Normal),
                consecutive_high: AtomicU32::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Register a cleanup callback for a pressure level
    pub fn on_memory_pressure<F, Fut>(&self, level: MemoryPressureLevel, callback: F)
    where
        F: Fn(MemoryUsageInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        let wrapped: PressureCallback = Arc::new(move |info| Box::pin(callback(info)));
        self.state.callbacks.write().push((level, wrapped));
    }

    /// Start sampling: once immediately, then every `interval_s`
    pub fn start(&self) -> crate::Result<()> {
        if !self.state.config.enabled {
            info!("Memory monitor disabled");
            return Ok(());
        }

        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Memory monitor already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| crate::Error::Runtime(format!("cannot start memory monitor: {}", e)))?;

        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let interval = self.state.config.interval();
        let token = cancel.clone();
        let handle = runtime.spawn(async move {
            state.check_pressure().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                state.check_pressure().await;
            }
        });

        *task = Some((cancel, handle));
        info!("Memory monitor started (every {}s)", interval.as_secs());
        Ok(())
    }

    /// Stop sampling
    pub fn stop(&self) {
        if let Some((cancel, _handle)) = self.task.lock().take() {
            cancel.cancel();
            info!("Memory monitor stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Take one sample without running any callbacks
    pub fn current_info(&self) -> MemoryUsageInfo {
        self.state.current_info()
    }

    /// Take one sample and react to it as a scheduled check would
    pub async fn check_pressure(&self) -> MemoryUsageInfo {
        self.state.check_pressure().await
    }

    /// Run every callback registered for `level`, returning how many ran
    pub async fn trigger_cleanup(&self, level: MemoryPressureLevel) -> usize {
        let info = self.state.current_info();
        self.state.run_callbacks(level, &info).await
    }

    /// Run the critical-level callbacks immediately
    pub async fn perform_emergency_cleanup(&self) -> usize {
        warn!("Performing emergency memory cleanup");
        self.trigger_cleanup(MemoryPressureLevel::Critical).await
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            info: self.state.current_info(),
            is_monitoring: self.is_monitoring(),
            callback_count: self.state.callbacks.read().len(),
            consecutive_high_pressure: self.state.consecutive_high.load(Ordering::SeqCst),
            thresholds: self.state.config.thresholds.in_megabytes(),
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        if let Some((cancel, _)) = self.task.get_mut().take() {
            cancel.cancel();
        }
    }
}

impl MonitorState {
    fn current_info(&self) -> MemoryUsageInfo {
        let sample = self.probe.sample();
        MemoryUsageInfo {
            heap_used_mb: bytes_to_megabytes(sample.used_bytes),
            heap_total_mb: bytes_to_megabytes(sample.total_bytes),
            pressure_level: self.config.thresholds.level_for(sample.used_bytes),
            timestamp: Utc::now(),
        }
    }

    async fn check_pressure(&self) -> MemoryUsageInfo {
        let info = self.current_info();
        let level = info.pressure_level;

        let consecutive = if level.is_high() {
            self.consecutive_high.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.consecutive_high.store(0, Ordering::SeqCst);
            0
        };

        let previous = std::mem::replace(&mut *self.last_level.lock(), level);
        if previous != level {
            info!(
                from = %previous,
                to = %level,
                heap_used_mb = info.heap_used_mb,
                "Memory pressure changed"
            );
            self.run_callbacks(level, &info).await;
        }

        if self.config.emergency_after > 0 && consecutive >= self.config.emergency_after {
            warn!(
                consecutive,
                "Sustained high memory pressure, triggering emergency cleanup"
            );
            self.run_callbacks(MemoryPressureLevel::Critical, &info).await;
            self.consecutive_high.store(0, Ordering::SeqCst);
        }

        info!(
            target: "steady::telemetry",
            heap_used_mb = info.heap_used_mb,
            heap_total_mb = info.heap_total_mb,
            pressure_level = %level,
            consecutive_high_pressure = self.consecutive_high.load(Ordering::SeqCst),
            "memory_usage"
        );

        info
    }

    async fn run_callbacks(&self, level: MemoryPressureLevel, info: &MemoryUsageInfo) -> usize {
        let callbacks: Vec<PressureCallback> = self
            .callbacks
            .read()
            .iter()
            .filter(|(registered, _)| *registered == level)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        if !callbacks.is_empty() {
            info!("Running {} cleanup callbacks for {} pressure", callbacks.len(), level);
        }

        for callback in &callbacks {
            match AssertUnwindSafe(callback(info.clone())).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Cleanup callback failed for {} level: {}", level, e),
                Err(_) => error!("Cleanup callback panicked for {} level", level),
            }
        }
        callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::probe::FixedMemoryProbe;
    use crate::pressure::types::MIB;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn monitor_with(used_mb: u64) -> (MemoryMonitor, Arc<FixedMemoryProbe>) {
        let probe = Arc::new(FixedMemoryProbe::new(used_mb * MIB, 50 * MIB));
        let monitor = MemoryMonitor::new(MemoryConfig::default(), probe.clone());
        (monitor, probe)
    }

    fn counter(monitor: &MemoryMonitor, level: MemoryPressureLevel) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        monitor.on_memory_pressure(level, move |_info| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        count
    }

    #[test]
    fn test_current_info() {
        let (monitor, _probe) = monitor_with(10);
        let info = monitor.current_info();
        assert_eq!(info.heap_used_mb, 10.0);
        assert_eq!(info.heap_total_mb, 50.0);
        assert_eq!(info.pressure_level, MemoryPressureLevel::Normal);
    }

    #[test]
    fn test_pressure_detection() {
        let (monitor, probe) = monitor_with(50);
        assert_eq!(monitor.current_info().pressure_level, MemoryPressureLevel::Moderate);
        probe.set_used(100 * MIB);
        assert_eq!(monitor.current_info().pressure_level, MemoryPressureLevel::High);
        probe.set_used(150 * MIB);
        assert_eq!(monitor.current_info().pressure_level, MemoryPressureLevel::Critical);
        probe.set_used(49 * MIB);
        assert_eq!(monitor.current_info().pressure_level, MemoryPressureLevel::Normal);
    }

    #[tokio::test]
    async fn test_trigger_cleanup_runs_only_matching_level() {
        let (monitor, _probe) = monitor_with(10);
        let moderate = counter(&monitor, MemoryPressureLevel::Moderate);
        let high = counter(&monitor, MemoryPressureLevel::High);

        assert_eq!(monitor.trigger_cleanup(MemoryPressureLevel::Moderate).await, 1);
        assert_eq!(moderate.load(Ordering::SeqCst), 1);
        assert_eq!(high.load(Ordering::SeqCst), 0);

        monitor.trigger_cleanup(MemoryPressureLevel::High).await;
        assert_eq!(high.load(Ordering::SeqCst), 1);
        assert_eq!(moderate.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_errors_are_contained() {
        let (monitor, _probe) = monitor_with(10);
        monitor.on_memory_pressure(MemoryPressureLevel::Moderate, |_info| async move {
            Err(crate::Error::handler("Cleanup failed"))
        });
        let working = counter(&monitor, MemoryPressureLevel::Moderate);

        assert_eq!(monitor.trigger_cleanup(MemoryPressureLevel::Moderate).await, 2);
        assert_eq!(working.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_panics_are_contained() {
        let (monitor, _probe) = monitor_with(10);
        monitor.on_memory_pressure(MemoryPressureLevel::Moderate, |_info| async move {
            if true {
                panic!("cleanup exploded");
            }
            Ok(())
        });
        let working = counter(&monitor, MemoryPressureLevel::Moderate);

        assert_eq!(monitor.trigger_cleanup(MemoryPressureLevel::Moderate).await, 2);
        assert_eq!(working.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampling_survives_panicking_callback() {
        let (monitor, probe) = monitor_with(60);
        monitor.on_memory_pressure(MemoryPressureLevel::Moderate, |_info| async move {
            if true {
                panic!("cleanup exploded");
            }
            Ok(())
        });
        let moderate = counter(&monitor, MemoryPressureLevel::Moderate);
        let normal = counter(&monitor, MemoryPressureLevel::Normal);

        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(moderate.load(Ordering::SeqCst), 1);

        probe.set_used(10 * MIB);
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert!(monitor.is_monitoring());
        assert_eq!(normal.load(Ordering::SeqCst), 1);

        monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let probe = Arc::new(FixedMemoryProbe::new(10 * MIB, 50 * MIB));
        let config = MemoryConfig {
            interval_s: 0,
            ..Default::default()
        };
        let monitor = MemoryMonitor::new(config, probe.clone());
        let moderate = counter(&monitor, MemoryPressureLevel::Moderate);

        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        probe.set_used(60 * MIB);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(moderate.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(moderate.load(Ordering::SeqCst), 1);
        monitor.stop();
    }

    #[tokio::test]
    async fn test_level_change_runs_callbacks_once() {
        let (monitor, probe) = monitor_with(10);
        let moderate = counter(&monitor, MemoryPressureLevel::Moderate);

        monitor.check_pressure().await;
        assert_eq!(moderate.load(Ordering::SeqCst), 0);

        probe.set_used(60 * MIB);
        monitor.check_pressure().await;
        monitor.check_pressure().await;
        assert_eq!(moderate.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sustained_high_pressure_triggers_emergency() {
        let (monitor, _probe) = monitor_with(120);
        let high = counter(&monitor, MemoryPressureLevel::High);
        let critical = counter(&monitor, MemoryPressureLevel::Critical);

        monitor.check_pressure().await;
        monitor.check_pressure().await;
        assert_eq!(monitor.stats().consecutive_high_pressure, 2);
        assert_eq!(critical.load(Ordering::SeqCst), 0);

        monitor.check_pressure().await;
        assert_eq!(high.load(Ordering::SeqCst), 1);
        assert_eq!(critical.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.stats().consecutive_high_pressure, 0);
    }

    #[tokio::test]
    async fn test_drop_to_normal_resets_counter() {
        let (monitor, probe) = monitor_with(120);
        monitor.check_pressure().await;
        probe.set_used(10 * MIB);
        monitor.check_pressure().await;
        assert_eq!(monitor.stats().consecutive_high_pressure, 0);
    }

    #[tokio::test]
    async fn test_emergency_cleanup() {
        let (monitor, _probe) = monitor_with(10);
        let critical = counter(&monitor, MemoryPressureLevel::Critical);
        assert_eq!(monitor.perform_emergency_cleanup().await, 1);
        assert_eq!(critical.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_samples_immediately_and_periodically() {
        let (monitor, probe) = monitor_with(60);
        let moderate = counter(&monitor, MemoryPressureLevel::Moderate);
        let normal = counter(&monitor, MemoryPressureLevel::Normal);

        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.is_monitoring());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(moderate.load(Ordering::SeqCst), 1);

        probe.set_used(10 * MIB);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(normal.load(Ordering::SeqCst), 1);

        monitor.stop();
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test]
    async fn test_disabled_monitor_does_not_start() {
        let probe = Arc::new(FixedMemoryProbe::new(0, 0));
        let config = MemoryConfig {
            enabled: false,
            ..Default::default()
        };
        let monitor = MemoryMonitor::new(config, probe);
        monitor.start().unwrap();
        assert!(!monitor.is_monitoring());
    }

    #[test]
    fn test_stats() {
        let (monitor, _probe) = monitor_with(10);
        let _ = counter(&monitor, MemoryPressureLevel::High);
        let stats = monitor.stats();
        assert!(!stats.is_monitoring);
        assert_eq!(stats.callback_count, 1);
        assert_eq!(stats.thresholds.moderate, 50.0);
        assert_eq!(stats.thresholds.high, 100.0);
        assert_eq!(stats.thresholds.critical, 150.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["pressure_level"], "normal");
    }
}
