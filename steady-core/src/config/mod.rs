//! Configuration management
//!
//! Loads the steady configuration from `~/.steady/config.json`, applies
//! `STEADY__` environment overrides and validates the result.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::ConfigLoader;
pub use schema::*;
pub use validate::validate_config;
