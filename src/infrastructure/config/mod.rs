//! Configuration management
//!
//! Hierarchical configuration using figment: defaults, project YAML files
//! and environment overrides, validated after extraction.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
