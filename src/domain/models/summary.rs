//! Per-cycle run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::attempt::{AttemptOutcome, AttemptRecord};
use super::classification::{ClassificationResult, Confidence, ErrorCategory};
use super::resource::ResourceId;

/// Why a degraded resource was not attempted this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    CoolingDown { retry_after: DateTime<Utc> },
    CircuitOpen {
        consecutive_failures: u32,
        resets_after: DateTime<Utc>,
    },
    AutoFixDisabled,
    NotAutoFixable { category: ErrorCategory },
    BelowThreshold { confidence: Confidence, priority: f64 },
    DeadlineReached,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoolingDown { retry_after } => {
                write!(f, "cooling down until {}", retry_after.to_rfc3339())
            }
            Self::CircuitOpen {
                consecutive_failures,
                resets_after,
            } => write!(
                f,
                "circuit open after {consecutive_failures} consecutive failures (resets after {})",
                resets_after.to_rfc3339()
            ),
            Self::AutoFixDisabled => f.write_str("auto-fix disabled"),
            Self::NotAutoFixable { category } => {
                write!(f, "{category} errors are not auto-fixable")
            }
            Self::BelowThreshold {
                confidence,
                priority,
            } => write!(
                f,
                "below auto-fix threshold (confidence {confidence}, priority {priority:.1})"
            ),
            Self::DeadlineReached => f.write_str("cycle deadline reached before scheduling"),
        }
    }
}

/// Final status of one resource in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Error count under the analysis threshold.
    Healthy,
    /// The signal source could not be queried.
    Error { reason: String },
    /// Degraded but not attempted.
    Skipped { reason: SkipReason },
    /// An attempt ran to a terminal outcome.
    Attempted { outcome: AttemptOutcome },
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Error { .. } => "error",
            Self::Skipped { .. } => "skipped",
            Self::Attempted { .. } => "attempted",
        }
    }
}

/// Outcome line for one configured resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub resource_id: ResourceId,
    pub error_count: Option<u64>,
    pub classification: Option<ClassificationResult>,
    pub status: ResourceStatus,
}

impl ResourceReport {
    /// Human-readable reason, for anything other than healthy or committed.
    pub fn reason(&self) -> Option<String> {
        match &self.status {
            ResourceStatus::Healthy => None,
            ResourceStatus::Error { reason } => Some(reason.clone()),
            ResourceStatus::Skipped { reason } => Some(reason.to_string()),
            ResourceStatus::Attempted { outcome } => outcome.reason(),
        }
    }
}

/// Aggregate result of one monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub monitored: usize,
    pub with_errors: usize,
    pub fixed: usize,
    pub failed: usize,
    pub rolled_back: usize,
    pub skipped: usize,
    pub errored: usize,
    /// Attempts in batch order.
    pub attempts: Vec<AttemptRecord>,
    /// One report per configured resource, in configuration order.
    pub resources: Vec<ResourceReport>,
    /// Batch layout as executed.
    pub batches: Vec<Vec<ResourceId>>,
    pub deadline_reached: bool,
}

impl RunSummary {
    /// Build a summary, deriving all counts from the reports.
    pub fn build(
        cycle_id: Uuid,
        started_at: DateTime<Utc>,
        resources: Vec<ResourceReport>,
        attempts: Vec<AttemptRecord>,
        batches: Vec<Vec<ResourceId>>,
        deadline_reached: bool,
    ) -> Self {
        let mut summary = Self {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            monitored: resources.len(),
            with_errors: 0,
            fixed: 0,
            failed: 0,
            rolled_back: 0,
            skipped: 0,
            errored: 0,
            attempts,
            resources: Vec::new(),
            batches,
            deadline_reached,
        };

        for report in &resources {
            match &report.status {
                ResourceStatus::Healthy => {}
                ResourceStatus::Error { .. } => summary.errored += 1,
                ResourceStatus::Skipped { .. } => {
                    summary.with_errors += 1;
                    summary.skipped += 1;
                }
                ResourceStatus::Attempted { outcome } => {
                    summary.with_errors += 1;
                    match outcome {
                        AttemptOutcome::Committed { .. } => summary.fixed += 1,
                        AttemptOutcome::RolledBack { .. } => summary.rolled_back += 1,
                        AttemptOutcome::Failed { .. } => summary.failed += 1,
                    }
                }
            }
        }

        summary.resources = resources;
        summary
    }

    pub fn report(&self, resource_id: &ResourceId) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| &r.resource_id == resource_id)
    }

    pub fn attempt(&self, resource_id: &ResourceId) -> Option<&AttemptRecord> {
        self.attempts.iter().find(|a| &a.resource_id == resource_id)
    }

    /// Attempts whose compensation failed.
    pub fn requiring_operator(&self) -> Vec<&AttemptRecord> {
        self.attempts
            .iter()
            .filter(|a| a.outcome.requires_operator())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::attempt::{Compensation, FailureStage};
    use crate::domain::models::resource::RevisionId;

    fn report(id: &str, status: ResourceStatus) -> ResourceReport {
        ResourceReport {
            resource_id: ResourceId::from(id),
            error_count: None,
            classification: None,
            status,
        }
    }

    #[test]
    fn test_counts_are_derived_from_reports() {
        let summary = RunSummary::build(
            Uuid::new_v4(),
            Utc::now(),
            vec![
                report("a", ResourceStatus::Healthy),
                report(
                    "b",
                    ResourceStatus::Error {
                        reason: "signal unavailable".to_string(),
                    },
                ),
                report(
                    "c",
                    ResourceStatus::Skipped {
                        reason: SkipReason::AutoFixDisabled,
                    },
                ),
                report(
                    "d",
                    ResourceStatus::Attempted {
                        outcome: AttemptOutcome::Committed {
                            revision: RevisionId::new("2"),
                        },
                    },
                ),
                report(
                    "e",
                    ResourceStatus::Attempted {
                        outcome: AttemptOutcome::RolledBack {
                            restored_revision: RevisionId::new("1"),
                            reason: "mismatch".to_string(),
                        },
                    },
                ),
                report(
                    "f",
                    ResourceStatus::Attempted {
                        outcome: AttemptOutcome::Failed {
                            stage: FailureStage::Apply,
                            reason: "denied".to_string(),
                            compensation: Compensation::Restored,
                        },
                    },
                ),
            ],
            vec![],
            vec![],
            false,
        );

        assert_eq!(summary.monitored, 6);
        assert_eq!(summary.with_errors, 4);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.fixed, 1);
        assert_eq!(summary.rolled_back, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_skip_reason_is_reported() {
        let r = report(
            "f3",
            ResourceStatus::Skipped {
                reason: SkipReason::CircuitOpen {
                    consecutive_failures: 3,
                    resets_after: Utc::now(),
                },
            },
        );
        assert!(r.reason().unwrap().contains("circuit open"));
        assert!(report("ok", ResourceStatus::Healthy).reason().is_none());
    }
}
