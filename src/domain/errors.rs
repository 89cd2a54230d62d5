//! Domain errors for the remediation control loop.

use thiserror::Error;

use crate::domain::models::ResourceId;

/// Resource-scoped remediation failures.
///
/// These never abort a cycle; they end up as a resource status or an
/// attempt outcome in the run summary.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("Signal unavailable for {resource}: {reason}")]
    SignalUnavailable { resource: ResourceId, reason: String },

    #[error("Snapshot failed for {resource}: {reason}")]
    SnapshotFailed { resource: ResourceId, reason: String },

    #[error("Remediation not applicable to {resource}: {reason}")]
    NotApplicable { resource: ResourceId, reason: String },

    #[error("Apply failed for {resource}: {reason}")]
    ApplyFailed { resource: ResourceId, reason: String },

    #[error("Publish failed for {resource}: {reason}")]
    PublishFailed { resource: ResourceId, reason: String },

    #[error("Alias update failed for {resource}: {reason}")]
    AliasFailed { resource: ResourceId, reason: String },

    #[error("Verification failed for {resource}: {reason}")]
    VerificationFailed { resource: ResourceId, reason: String },

    #[error("Rollback failed for {resource}: {reason}")]
    RollbackFailed { resource: ResourceId, reason: String },
}

/// Failures that abort a whole cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Invalid cycle configuration: {0}")]
    InvalidConfig(String),

    #[error("Signal source unavailable for all {resources} resources")]
    SignalOutage { resources: usize },
}

pub type CycleResult<T> = Result<T, CycleError>;
