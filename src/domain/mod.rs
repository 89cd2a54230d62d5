//! Domain layer for the Mender remediation loop
//!
//! This module contains core business models, errors and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CycleError, CycleResult, RemediationError};
