//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, plus the
//! JSON-lines attempt journal.

pub mod config;
pub mod journal;
pub mod logger;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use journal::AttemptJournal;
pub use logger::LoggerImpl;
