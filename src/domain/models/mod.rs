//! Domain models for the remediation control loop.

pub mod attempt;
pub mod classification;
pub mod config;
pub mod cooldown;
pub mod remediation;
pub mod resource;
pub mod summary;

pub use attempt::{
    AttemptOutcome, AttemptRecord, AttemptState, Compensation, FailureStage, StateTransition,
};
pub use classification::{CategoryCounts, ClassificationResult, Confidence, ErrorCategory};
pub use config::{
    CatalogConfig, Config, CycleConfig, DatabaseConfig, LoggingConfig, MAX_COOLDOWN_SECS,
};
pub use cooldown::{CooldownEntry, CooldownTable, GateDecision, GatePolicy};
pub use remediation::{ActionKind, Mutation, PolicyDecision, RemediationAction, RemediationDescriptor};
pub use resource::{
    DiagnosticSample, ErrorWindow, ResourceConfig, ResourceId, ResourceState, RevisionId, Snapshot,
};
pub use summary::{ResourceReport, ResourceStatus, RunSummary, SkipReason};
