//! Error types for steady

use thiserror::Error;

/// The main error type for steady operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// No async runtime available to drive a background task
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A chunk handler or cleanup callback failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for handler failures raised from user callbacks
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::Handler(msg.into())
    }
}

/// A specialized Result type for steady operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("processor.max_chunk_size must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: processor.max_chunk_size must be > 0"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
