//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = config.processor.validation_errors("processor");

    if config.memory.interval_s == 0 {
        errors.push("memory.interval_s must be > 0".to_string());
    }
    let thresholds = &config.memory.thresholds;
    if !(thresholds.moderate_bytes < thresholds.high_bytes
        && thresholds.high_bytes < thresholds.critical_bytes)
    {
        errors.push(
            "memory.thresholds must satisfy moderate_bytes < high_bytes < critical_bytes"
                .to_string(),
        );
    }

    if config.window.max_messages == 0 {
        errors.push("window.max_messages must be > 0".to_string());
    }

    match config.logging.format.to_ascii_lowercase().as_str() {
        "text" | "json" => {}
        other => errors.push(format!(
            "logging.format must be 'text' or 'json', got '{}'",
            other
        )),
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
