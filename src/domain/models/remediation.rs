//! Remediation policy model.
//!
//! Actions form a closed tagged enum so every category's handling is checked
//! exhaustively at compile time. An action is policy; a [`Mutation`] is the
//! concrete change computed from an action and the captured snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::classification::{Confidence, ErrorCategory};
use super::resource::ResourceConfig;

/// Broad kind of change an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Changes a numeric configuration property.
    Configuration,
    /// Replaces the code package.
    Code,
    /// Requires a human; never applied automatically.
    Manual,
}

/// Structural action a remediation descriptor prescribes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationAction {
    /// Raise the invocation timeout to the ceiling.
    RaiseTimeout { ceiling_secs: u32 },
    /// Multiply the memory allocation, capped at the ceiling.
    RaiseMemory { multiplier: u32, ceiling_mb: u32 },
    /// Rebuild the code package with its dependencies bundled.
    RepackageDependencies,
    /// Hand off to an operator.
    ManualReview,
}

impl RemediationAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::RaiseTimeout { .. } | Self::RaiseMemory { .. } => ActionKind::Configuration,
            Self::RepackageDependencies => ActionKind::Code,
            Self::ManualReview => ActionKind::Manual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RaiseTimeout { .. } => "raise_timeout",
            Self::RaiseMemory { .. } => "raise_memory",
            Self::RepackageDependencies => "repackage_dependencies",
            Self::ManualReview => "manual_review",
        }
    }

    /// Compute the concrete mutation for a resource currently configured as
    /// `current`.
    ///
    /// Returns `Err` with a human-readable reason when the action cannot make
    /// progress: manual actions, or a property already at its ceiling.
    pub fn plan_mutation(&self, current: &ResourceConfig) -> Result<Mutation, String> {
        match *self {
            Self::RaiseTimeout { ceiling_secs } => {
                if current.timeout_secs >= ceiling_secs {
                    return Err(format!(
                        "timeout already at {}s (ceiling {}s)",
                        current.timeout_secs, ceiling_secs
                    ));
                }
                Ok(Mutation::SetTimeout(ceiling_secs))
            }
            Self::RaiseMemory {
                multiplier,
                ceiling_mb,
            } => {
                if current.memory_mb >= ceiling_mb {
                    return Err(format!(
                        "memory already at {}MB (ceiling {}MB)",
                        current.memory_mb, ceiling_mb
                    ));
                }
                let target = current.memory_mb.saturating_mul(multiplier).min(ceiling_mb);
                if target <= current.memory_mb {
                    return Err(format!("multiplier {multiplier} does not raise memory"));
                }
                Ok(Mutation::SetMemory(target))
            }
            Self::RepackageDependencies => Ok(Mutation::RepackageDependencies),
            Self::ManualReview => Err("action requires manual review".to_string()),
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaiseTimeout { ceiling_secs } => write!(f, "raise timeout to {ceiling_secs}s"),
            Self::RaiseMemory {
                multiplier,
                ceiling_mb,
            } => write!(f, "raise memory x{multiplier} (max {ceiling_mb}MB)"),
            Self::RepackageDependencies => f.write_str("repackage dependencies"),
            Self::ManualReview => f.write_str("manual review"),
        }
    }
}

/// Concrete change sent to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Mutation {
    SetTimeout(u32),
    SetMemory(u32),
    RepackageDependencies,
}

impl Mutation {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SetTimeout(_) | Self::SetMemory(_) => ActionKind::Configuration,
            Self::RepackageDependencies => ActionKind::Code,
        }
    }

    /// Apply this mutation to a configuration. Code mutations leave it as is.
    pub fn apply_to(&self, config: &mut ResourceConfig) {
        match *self {
            Self::SetTimeout(secs) => config.timeout_secs = secs,
            Self::SetMemory(mb) => config.memory_mb = mb,
            Self::RepackageDependencies => {}
        }
    }

    /// Whether `config` holds the value this mutation targets.
    /// Always true for code mutations; those verify by alias placement.
    pub fn is_reflected_in(&self, config: &ResourceConfig) -> bool {
        match *self {
            Self::SetTimeout(secs) => config.timeout_secs == secs,
            Self::SetMemory(mb) => config.memory_mb == mb,
            Self::RepackageDependencies => true,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetTimeout(secs) => write!(f, "timeout={secs}s"),
            Self::SetMemory(mb) => write!(f, "memory={mb}MB"),
            Self::RepackageDependencies => f.write_str("repackage"),
        }
    }
}

/// Static policy entry for one error category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationDescriptor {
    pub category: ErrorCategory,
    pub auto_fixable: bool,
    /// Base priority, 1-10.
    pub priority: u8,
    pub action: RemediationAction,
    /// Operator guidance shown alongside reports.
    pub guidance: String,
}

/// Policy verdict for a classified resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub descriptor: RemediationDescriptor,
    pub confidence: Confidence,
    /// Scaled priority, 0.0-10.0.
    pub priority: f64,
}
