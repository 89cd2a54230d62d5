//! Mender - remediation control loop
//!
//! Mender watches a set of managed resources, classifies the errors they
//! emit, and applies catalogued remediations. Every change is published as
//! a new revision behind a live alias, verified, and rolled back by pointing
//! the alias at the prior revision when verification fails.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the ports to the
//!   signal source, the control plane and cooldown persistence
//! - **Service Layer** (`services`): classifier, remediation catalog,
//!   eligibility gate, attempt state machine and cycle orchestrator
//! - **Adapters** (`adapters`): in-memory and SQLite port implementations
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use mender::{ConfigLoader, CooldownTable, RemediationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let orchestrator =
//!         RemediationOrchestrator::from_config(signals, control_plane, &config).await?;
//!     let mut cooldowns = CooldownTable::new();
//!     let summary = orchestrator.run_cycle(&config.cycle, &mut cooldowns).await?;
//!     println!("fixed {} of {}", summary.fixed, summary.with_errors);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{CycleError, CycleResult, RemediationError};
pub use domain::models::{
    AttemptOutcome, AttemptRecord, AttemptState, ClassificationResult, Compensation, Config,
    Confidence, CooldownEntry, CooldownTable, CycleConfig, ErrorCategory, RemediationAction,
    ResourceId, ResourceStatus, RevisionId, RunSummary, SkipReason,
};
pub use domain::ports::{ControlPlane, CooldownStore, SignalSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::{AttemptJournal, LogConfig, LoggerImpl};
pub use services::{
    AttemptMachine, Classifier, CycleEvent, RemediationCatalog, RemediationOrchestrator,
};
