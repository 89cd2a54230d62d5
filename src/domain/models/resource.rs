//! Managed resource domain model.
//!
//! A resource is the externally managed unit being remediated (for example a
//! deployable function). Its live traffic is designated by an alias that
//! points at one immutable, published revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a managed resource.
///
/// Stable across attempts; used as the cooldown and circuit-breaker key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of an immutable, published revision of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric configuration properties a remediation may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Invocation timeout in seconds.
    pub timeout_secs: u32,
    /// Memory allocation in megabytes.
    pub memory_mb: u32,
}

/// Observed state of a resource as seen through its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Revision the alias currently points at.
    pub revision: RevisionId,
    /// Configuration of that revision.
    pub config: ResourceConfig,
    /// Digest of the code package of that revision.
    pub code_sha256: String,
}

/// Pre-attempt capture of a resource, owned by exactly one attempt.
///
/// Dropped when the attempt commits; consumed when it rolls back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub resource_id: ResourceId,
    pub prior: ResourceState,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(resource_id: ResourceId, prior: ResourceState) -> Self {
        Self {
            resource_id,
            prior,
            captured_at: Utc::now(),
        }
    }

    /// Revision the alias pointed at before the attempt started.
    pub fn prior_revision(&self) -> &RevisionId {
        &self.prior.revision
    }
}

/// One diagnostic line retrieved from the signal source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSample {
    pub timestamp: DateTime<Utc>,
    /// Raw diagnostic text.
    pub message: String,
    /// Identifier of the log stream the line came from.
    pub stream: String,
}

impl DiagnosticSample {
    pub fn new(message: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            stream: stream.into(),
        }
    }
}

/// Error and invocation counts over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorWindow {
    pub error_count: u64,
    pub invocations: u64,
}

impl ErrorWindow {
    /// Fraction of invocations that errored, 0.0 when there were none.
    pub fn error_rate(&self) -> f64 {
        if self.invocations == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.invocations as f64
    }
}
