//! Logging setup: env filter, stderr console layer and a daily rolling file

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::LoggingConfig;
use crate::utils::ensure_dir;

/// Prefix of rolled log files, e.g. `steady.log.2024-05-01`
pub const LOG_FILE_PREFIX: &str = "steady.log";

/// Initialize the logging system
///
/// `RUST_LOG` and `LOG_FORMAT` win over the configured level and format.
/// The returned guard must be held for as long as file output is wanted.
pub fn init_logging(config: &LoggingConfig) -> crate::Result<WorkerGuard> {
    let filter = build_filter(config);

    let format_str = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let is_json = format_str.eq_ignore_ascii_case("json");

    ensure_dir(&config.dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("logging already initialized: {}", e)))?;

    match cleanup_old_logs(&config.dir, config.retention_days) {
        Ok(0) => {}
        Ok(removed) => tracing::debug!("Removed {} expired log files", removed),
        Err(e) => tracing::warn!("Failed to clean up old logs: {}", e),
    }

    Ok(guard)
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }

    filter
}

/// Remove rolled log files older than `days` days, returning how many went
fn cleanup_old_logs<P: AsRef<Path>>(dir: P, days: u64) -> std::io::Result<usize> {
    let path = dir.as_ref();
    if !path.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let threshold = Duration::from_secs(days * 24 * 3600);
    let mut removed = 0;

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_log {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > threshold);
        if expired {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backdate(path: &Path, days: u64) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        let old = SystemTime::now() - Duration::from_secs(days * 24 * 3600);
        file.set_modified(old).unwrap();
    }

    #[test]
    fn test_cleanup_removes_only_expired_logs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let old_log = dir.join("steady.log.2020-01-01");
        let fresh_log = dir.join("steady.log.2099-01-01");
        let other = dir.join("notes.txt");
        for p in [&old_log, &fresh_log, &other] {
            std::fs::write(p, "x").unwrap();
        }
        backdate(&old_log, 10);
        backdate(&other, 10);

        let removed = cleanup_old_logs(dir, 7).unwrap();

        assert_eq!(removed, 1);
        assert!(!old_log.exists());
        assert!(fresh_log.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, 7).unwrap(), 0);
    }

    #[test]
    fn test_filter_accepts_overrides() {
        let mut config = LoggingConfig::default();
        config
            .overrides
            .insert("steady_core::processor".to_string(), "debug".to_string());
        let filter = build_filter(&config);
        assert!(filter.to_string().contains("steady_core::processor=debug"));
    }
}
