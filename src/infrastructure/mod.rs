//! Infrastructure layer
//!
//! Configuration loading and logging. Port implementations live in
//! `adapters`.

pub mod config;
pub mod logging;
