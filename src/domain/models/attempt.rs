//! Remediation attempt domain model.
//!
//! An attempt walks `Idle → SnapshotCaptured → Applied → Published →
//! Verifying` and ends in exactly one terminal outcome. `RolledBack` and
//! `Failed` are separate variants with no conversion between them, so a
//! failed compensation can never be mistaken for a successful one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::classification::ErrorCategory;
use super::remediation::RemediationAction;
use super::resource::{ResourceId, RevisionId};

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    SnapshotCaptured,
    Applied,
    Published,
    Verifying,
    Committed,
    RolledBack,
    Failed,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::Idle
    }
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SnapshotCaptured => "snapshot_captured",
            Self::Applied => "applied",
            Self::Published => "published",
            Self::Verifying => "verifying",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Failed)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<AttemptState> {
        match self {
            Self::Idle => vec![Self::SnapshotCaptured, Self::Failed],
            Self::SnapshotCaptured => vec![Self::Applied, Self::Failed],
            Self::Applied => vec![Self::Published, Self::Failed],
            Self::Published => vec![Self::Verifying, Self::Failed],
            Self::Verifying => vec![Self::Committed, Self::RolledBack, Self::Failed],
            Self::Committed | Self::RolledBack | Self::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Step at which a failed attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Snapshot,
    Apply,
    Publish,
    Alias,
    Verify,
    Rollback,
    /// The attempt task itself aborted before reporting.
    Execution,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Apply => "apply",
            Self::Publish => "publish",
            Self::Alias => "alias",
            Self::Verify => "verify",
            Self::Rollback => "rollback",
            Self::Execution => "execution",
        }
    }
}

/// What happened to the resource after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Compensation {
    /// Nothing had been mutated.
    NotNeeded,
    /// The pre-attempt state was restored.
    Restored,
    /// Rollback is switched off; the resource was left as it was.
    Disabled,
    /// Restoring failed; the resource may be inconsistent.
    RestoreFailed { reason: String },
}

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Verified; the alias points at the new revision.
    Committed { revision: RevisionId },
    /// Verification failed and the alias was pointed back at the prior
    /// revision.
    RolledBack {
        restored_revision: RevisionId,
        reason: String,
    },
    /// The attempt could not complete.
    Failed {
        stage: FailureStage,
        reason: String,
        compensation: Compensation,
    },
}

impl AttemptOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn state(&self) -> AttemptState {
        match self {
            Self::Committed { .. } => AttemptState::Committed,
            Self::RolledBack { .. } => AttemptState::RolledBack,
            Self::Failed { .. } => AttemptState::Failed,
        }
    }

    /// True when a compensating action failed and a human must intervene.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                compensation: Compensation::RestoreFailed { .. },
                ..
            }
        )
    }

    /// Human-readable reason; `None` for committed attempts.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Committed { .. } => None,
            Self::RolledBack { reason, .. } => Some(reason.clone()),
            Self::Failed {
                stage,
                reason,
                compensation,
            } => Some(match compensation {
                Compensation::RestoreFailed { reason: restore } => format!(
                    "{} failed: {reason}; restore failed: {restore} (manual remediation required)",
                    stage.as_str()
                ),
                _ => format!("{} failed: {reason}", stage.as_str()),
            }),
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { revision } => write!(f, "committed revision {revision}"),
            Self::RolledBack {
                restored_revision,
                reason,
            } => write!(f, "rolled back to revision {restored_revision}: {reason}"),
            Self::Failed { .. } => write!(f, "{}", self.reason().unwrap_or_default()),
        }
    }
}

/// Timestamped state change inside an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: AttemptState,
    pub at: DateTime<Utc>,
}

/// Append-only record of one completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub resource_id: ResourceId,
    pub category: ErrorCategory,
    pub action: RemediationAction,
    pub outcome: AttemptOutcome,
    /// Published revision, set only when committed.
    pub new_revision: Option<RevisionId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transitions: Vec<StateTransition>,
}

impl AttemptRecord {
    /// Record for an attempt whose task aborted without reporting.
    pub fn aborted(
        resource_id: ResourceId,
        category: ErrorCategory,
        action: RemediationAction,
        started_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            resource_id,
            category,
            action,
            outcome: AttemptOutcome::Failed {
                stage: FailureStage::Execution,
                reason: reason.into(),
                compensation: Compensation::RestoreFailed {
                    reason: "attempt aborted; resource state unknown".to_string(),
                },
            },
            new_revision: None,
            started_at,
            finished_at: now,
            transitions: vec![StateTransition {
                state: AttemptState::Failed,
                at: now,
            }],
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
