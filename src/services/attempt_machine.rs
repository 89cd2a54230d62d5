//! Remediation attempt state machine.
//!
//! Drives one attempt for one resource through
//! `Idle → SnapshotCaptured → Applied → Published → Verifying` and into a
//! terminal outcome. Every side effect after the snapshot is compensable:
//! before publish by restoring the snapshot's working configuration, after
//! publish by pointing the alias back at the prior, already-published
//! revision. A failed compensation is never retried here; it surfaces as
//! [`Compensation::RestoreFailed`] for an operator.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::RemediationError;
use crate::domain::models::{
    AttemptOutcome, AttemptRecord, AttemptState, Compensation, CycleConfig, ErrorCategory,
    FailureStage, Mutation, RemediationAction, ResourceId, ResourceState, RevisionId, Snapshot,
    StateTransition,
};
use crate::domain::ports::ControlPlane;

/// Per-attempt settings taken from the cycle configuration.
#[derive(Debug, Clone)]
pub struct AttemptSettings {
    /// Alias carrying live traffic.
    pub alias: String,
    /// Wait between the alias switch and verification.
    pub settle_delay: Duration,
    /// Point the alias back when verification fails.
    pub rollback_enabled: bool,
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            alias: "live".to_string(),
            settle_delay: Duration::from_secs(5),
            rollback_enabled: true,
        }
    }
}

impl From<&CycleConfig> for AttemptSettings {
    fn from(config: &CycleConfig) -> Self {
        Self {
            alias: config.alias.clone(),
            settle_delay: config.settle_delay(),
            rollback_enabled: config.rollback_enabled,
        }
    }
}

/// What to attempt on which resource.
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    pub resource_id: ResourceId,
    pub category: ErrorCategory,
    pub action: RemediationAction,
}

/// Tracks the current state and its timestamped history.
struct Progress {
    state: AttemptState,
    transitions: Vec<StateTransition>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: AttemptState::Idle,
            transitions: vec![StateTransition {
                state: AttemptState::Idle,
                at: Utc::now(),
            }],
        }
    }

    fn advance(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid attempt transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        self.state = next;
        self.transitions.push(StateTransition {
            state: next,
            at: Utc::now(),
        });
    }
}

fn failed(stage: FailureStage, err: &RemediationError, compensation: Compensation) -> AttemptOutcome {
    AttemptOutcome::Failed {
        stage,
        reason: err.to_string(),
        compensation,
    }
}

fn describe_mismatch(mutation: &Mutation, observed: &ResourceState) -> String {
    format!(
        "expected {mutation}, observed timeout={}s memory={}MB on revision {}",
        observed.config.timeout_secs, observed.config.memory_mb, observed.revision
    )
}

/// Executes attempts against a control plane.
#[derive(Clone)]
pub struct AttemptMachine {
    control: Arc<dyn ControlPlane>,
    settings: AttemptSettings,
}

impl AttemptMachine {
    pub fn new(control: Arc<dyn ControlPlane>, settings: AttemptSettings) -> Self {
        Self { control, settings }
    }

    pub fn settings(&self) -> &AttemptSettings {
        &self.settings
    }

    /// Run one attempt to a terminal outcome. Never returns early without a
    /// record.
    #[instrument(
        name = "attempt",
        skip(self, plan),
        fields(
            resource = %plan.resource_id,
            category = %plan.category,
            action = plan.action.as_str(),
        )
    )]
    pub async fn execute(&self, plan: AttemptPlan) -> AttemptRecord {
        let started_at = Utc::now();
        let mut progress = Progress::new();

        let outcome = self.drive(&plan, &mut progress).await;
        progress.advance(outcome.state());

        match &outcome {
            AttemptOutcome::Committed { revision } => {
                info!(revision = %revision, "remediation committed");
            }
            AttemptOutcome::RolledBack {
                restored_revision,
                reason,
            } => {
                warn!(restored_revision = %restored_revision, reason = %reason, "remediation rolled back");
            }
            AttemptOutcome::Failed { stage, reason, .. } if !outcome.requires_operator() => {
                warn!(stage = stage.as_str(), reason = %reason, "remediation failed");
            }
            AttemptOutcome::Failed { .. } => {}
        }

        let new_revision = match &outcome {
            AttemptOutcome::Committed { revision } => Some(revision.clone()),
            _ => None,
        };

        AttemptRecord {
            id: Uuid::new_v4(),
            resource_id: plan.resource_id,
            category: plan.category,
            action: plan.action,
            outcome,
            new_revision,
            started_at,
            finished_at: Utc::now(),
            transitions: progress.transitions,
        }
    }

    async fn drive(&self, plan: &AttemptPlan, progress: &mut Progress) -> AttemptOutcome {
        let resource = &plan.resource_id;
        let alias = self.settings.alias.as_str();

        let snapshot = match self.control.snapshot(resource, alias).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = RemediationError::SnapshotFailed {
                    resource: resource.clone(),
                    reason: e.to_string(),
                };
                return failed(FailureStage::Snapshot, &err, Compensation::NotNeeded);
            }
        };
        progress.advance(AttemptState::SnapshotCaptured);
        debug!(revision = %snapshot.prior_revision(), "snapshot captured");

        let mutation = match plan.action.plan_mutation(&snapshot.prior.config) {
            Ok(mutation) => mutation,
            Err(reason) => {
                let err = RemediationError::NotApplicable {
                    resource: resource.clone(),
                    reason,
                };
                return failed(FailureStage::Apply, &err, Compensation::NotNeeded);
            }
        };

        if let Err(e) = self.control.apply(resource, &mutation).await {
            let err = RemediationError::ApplyFailed {
                resource: resource.clone(),
                reason: e.to_string(),
            };
            return self.restore_working_copy(&snapshot, FailureStage::Apply, &err).await;
        }
        progress.advance(AttemptState::Applied);
        debug!(mutation = %mutation, "mutation applied");

        let revision = match self.control.publish(resource).await {
            Ok(revision) => revision,
            Err(e) => {
                let err = RemediationError::PublishFailed {
                    resource: resource.clone(),
                    reason: e.to_string(),
                };
                return self.restore_working_copy(&snapshot, FailureStage::Publish, &err).await;
            }
        };
        progress.advance(AttemptState::Published);
        debug!(revision = %revision, "revision published");

        if let Err(e) = self.control.set_alias(resource, alias, &revision).await {
            let err = RemediationError::AliasFailed {
                resource: resource.clone(),
                reason: e.to_string(),
            };
            return self.repoint_alias(&snapshot, FailureStage::Alias, &err).await;
        }
        progress.advance(AttemptState::Verifying);

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        match self.verify(resource, &mutation, &revision).await {
            Ok(()) => AttemptOutcome::Committed { revision },
            Err(err) => self.roll_back(snapshot, &err).await,
        }
    }

    /// Re-read the resource and confirm the targeted property.
    ///
    /// Configuration mutations need an exact value match on the new revision;
    /// code mutations need the alias on the new revision.
    async fn verify(
        &self,
        resource: &ResourceId,
        mutation: &Mutation,
        revision: &RevisionId,
    ) -> Result<(), RemediationError> {
        let observed = self
            .control
            .read(resource, &self.settings.alias)
            .await
            .map_err(|e| RemediationError::VerificationFailed {
                resource: resource.clone(),
                reason: format!("state could not be read: {e}"),
            })?;

        if &observed.revision != revision {
            return Err(RemediationError::VerificationFailed {
                resource: resource.clone(),
                reason: format!(
                    "alias '{}' points at revision {}, expected {}",
                    self.settings.alias, observed.revision, revision
                ),
            });
        }

        if !mutation.is_reflected_in(&observed.config) {
            return Err(RemediationError::VerificationFailed {
                resource: resource.clone(),
                reason: describe_mismatch(mutation, &observed),
            });
        }

        Ok(())
    }

    /// Compensate a verification failure by pointing the alias back at the
    /// snapshot's revision. Consumes the snapshot.
    async fn roll_back(&self, snapshot: Snapshot, cause: &RemediationError) -> AttemptOutcome {
        let resource = &snapshot.resource_id;
        if !self.settings.rollback_enabled {
            warn!(reason = %cause, "verification failed and rollback is disabled");
            return failed(FailureStage::Verify, cause, Compensation::Disabled);
        }

        let prior = snapshot.prior_revision();
        match self
            .control
            .set_alias(resource, &self.settings.alias, prior)
            .await
        {
            Ok(()) => AttemptOutcome::RolledBack {
                restored_revision: prior.clone(),
                reason: cause.to_string(),
            },
            Err(e) => {
                let rollback_err = RemediationError::RollbackFailed {
                    resource: resource.clone(),
                    reason: e.to_string(),
                };
                error!(
                    prior_revision = %prior,
                    cause = %cause,
                    error = %rollback_err,
                    "rollback failed; manual remediation required"
                );
                failed(
                    FailureStage::Rollback,
                    cause,
                    Compensation::RestoreFailed {
                        reason: rollback_err.to_string(),
                    },
                )
            }
        }
    }

    /// Compensate a failure before anything was published.
    async fn restore_working_copy(
        &self,
        snapshot: &Snapshot,
        stage: FailureStage,
        cause: &RemediationError,
    ) -> AttemptOutcome {
        match self.control.restore(snapshot).await {
            Ok(()) => failed(stage, cause, Compensation::Restored),
            Err(e) => {
                error!(
                    stage = stage.as_str(),
                    cause = %cause,
                    error = %e,
                    "snapshot restore failed; resource may be inconsistent, operator attention required"
                );
                failed(
                    stage,
                    cause,
                    Compensation::RestoreFailed {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Compensate a failed alias switch by pointing the alias at the prior
    /// revision again.
    async fn repoint_alias(
        &self,
        snapshot: &Snapshot,
        stage: FailureStage,
        cause: &RemediationError,
    ) -> AttemptOutcome {
        let prior = snapshot.prior_revision();
        match self
            .control
            .set_alias(&snapshot.resource_id, &self.settings.alias, prior)
            .await
        {
            Ok(()) => failed(stage, cause, Compensation::Restored),
            Err(e) => {
                error!(
                    prior_revision = %prior,
                    cause = %cause,
                    error = %e,
                    "alias could not be restored; operator attention required"
                );
                failed(
                    stage,
                    cause,
                    Compensation::RestoreFailed {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{Fault, InMemoryControlPlane};
    use crate::domain::models::{ActionKind, ResourceConfig};

    fn settings() -> AttemptSettings {
        AttemptSettings {
            alias: "live".to_string(),
            settle_delay: Duration::ZERO,
            rollback_enabled: true,
        }
    }

    fn timeout_plan(id: &str) -> AttemptPlan {
        AttemptPlan {
            resource_id: ResourceId::from(id),
            category: ErrorCategory::Timeout,
            action: RemediationAction::RaiseTimeout { ceiling_secs: 900 },
        }
    }

    fn repackage_plan(id: &str) -> AttemptPlan {
        AttemptPlan {
            resource_id: ResourceId::from(id),
            category: ErrorCategory::Dependency,
            action: RemediationAction::RepackageDependencies,
        }
    }

    async fn plane_with(id: &str) -> Arc<InMemoryControlPlane> {
        let plane = Arc::new(InMemoryControlPlane::new("live"));
        plane
            .register(
                ResourceId::from(id),
                ResourceConfig {
                    timeout_secs: 3,
                    memory_mb: 128,
                },
            )
            .await;
        plane
    }

    fn states(record: &AttemptRecord) -> Vec<AttemptState> {
        record.transitions.iter().map(|t| t.state).collect()
    }

    #[tokio::test]
    async fn test_config_change_commits() {
        let plane = plane_with("f1").await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f1")).await;

        assert!(record.outcome.is_committed());
        assert_eq!(
            states(&record),
            vec![
                AttemptState::Idle,
                AttemptState::SnapshotCaptured,
                AttemptState::Applied,
                AttemptState::Published,
                AttemptState::Verifying,
                AttemptState::Committed,
            ]
        );
        let live = plane.read(&ResourceId::from("f1"), "live").await.unwrap();
        assert_eq!(Some(&live.revision), record.new_revision.as_ref());
        assert_eq!(live.config.timeout_secs, 900);
    }

    #[tokio::test]
    async fn test_code_change_commits() {
        let plane = plane_with("f4").await;
        let before = plane.read(&ResourceId::from("f4"), "live").await.unwrap();
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(repackage_plan("f4")).await;

        assert_eq!(record.action.kind(), ActionKind::Code);
        assert!(record.outcome.is_committed());
        let live = plane.read(&ResourceId::from("f4"), "live").await.unwrap();
        assert_eq!(Some(&live.revision), record.new_revision.as_ref());
        assert_ne!(live.code_sha256, before.code_sha256);
    }

    #[tokio::test]
    async fn test_unchanged_value_rolls_back() {
        let plane = plane_with("f2").await;
        let before = plane.read(&ResourceId::from("f2"), "live").await.unwrap();
        plane.inject(ResourceId::from("f2"), Fault::IgnoreMutation).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f2")).await;

        match &record.outcome {
            AttemptOutcome::RolledBack {
                restored_revision, ..
            } => assert_eq!(restored_revision, &before.revision),
            other => panic!("expected rollback, got {other:?}"),
        }
        let live = plane.read(&ResourceId::from("f2"), "live").await.unwrap();
        assert_eq!(live.revision, before.revision);
        assert!(record.new_revision.is_none());
    }

    #[tokio::test]
    async fn test_code_change_rolls_back_when_alias_drifts() {
        let plane = plane_with("f5").await;
        let before = plane.read(&ResourceId::from("f5"), "live").await.unwrap();
        plane.inject(ResourceId::from("f5"), Fault::AliasDrift).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(repackage_plan("f5")).await;

        assert_eq!(record.outcome.state(), AttemptState::RolledBack);
        let live = plane.read(&ResourceId::from("f5"), "live").await.unwrap();
        assert_eq!(live.revision, before.revision);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_not_rolled_back() {
        let plane = plane_with("f6").await;
        plane.inject(ResourceId::from("f6"), Fault::IgnoreMutation).await;
        plane.inject(ResourceId::from("f6"), Fault::FailRollback).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f6")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Rollback,
                compensation: Compensation::RestoreFailed { .. },
                ..
            }
        ));
        assert!(record.outcome.requires_operator());
    }

    #[tokio::test]
    async fn test_snapshot_failure_mutates_nothing() {
        let plane = plane_with("f7").await;
        plane.inject(ResourceId::from("f7"), Fault::FailSnapshot).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f7")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Snapshot,
                compensation: Compensation::NotNeeded,
                ..
            }
        ));
        assert_eq!(plane.mutation_count(&ResourceId::from("f7")).await, 0);
    }

    #[tokio::test]
    async fn test_apply_failure_restores_snapshot() {
        let plane = plane_with("f8").await;
        plane.inject(ResourceId::from("f8"), Fault::FailApply).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f8")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Apply,
                compensation: Compensation::Restored,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_apply_and_restore_failure_requires_operator() {
        let plane = plane_with("f9").await;
        plane.inject(ResourceId::from("f9"), Fault::FailApply).await;
        plane.inject(ResourceId::from("f9"), Fault::FailRestore).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f9")).await;

        assert!(record.outcome.requires_operator());
        assert_eq!(record.outcome.state(), AttemptState::Failed);
    }

    #[tokio::test]
    async fn test_publish_failure_restores_working_copy() {
        let plane = plane_with("f10").await;
        plane.inject(ResourceId::from("f10"), Fault::FailPublish).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f10")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Publish,
                compensation: Compensation::Restored,
                ..
            }
        ));
        let working = plane.working_config(&ResourceId::from("f10")).await.unwrap();
        assert_eq!(working.timeout_secs, 3);
    }

    #[tokio::test]
    async fn test_alias_failure_keeps_prior_revision() {
        let plane = plane_with("f11").await;
        let before = plane.read(&ResourceId::from("f11"), "live").await.unwrap();
        plane.inject(ResourceId::from("f11"), Fault::FailAliasSwitch).await;
        let machine = AttemptMachine::new(plane.clone(), settings());

        let record = machine.execute(timeout_plan("f11")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Alias,
                ..
            }
        ));
        let live = plane.read(&ResourceId::from("f11"), "live").await.unwrap();
        assert_eq!(live.revision, before.revision);
    }

    #[tokio::test]
    async fn test_value_at_ceiling_is_not_applied() {
        let plane = plane_with("f12").await;
        let machine = AttemptMachine::new(plane.clone(), settings());
        let plan = AttemptPlan {
            action: RemediationAction::RaiseTimeout { ceiling_secs: 3 },
            ..timeout_plan("f12")
        };

        let record = machine.execute(plan).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Apply,
                compensation: Compensation::NotNeeded,
                ..
            }
        ));
        assert_eq!(plane.mutation_count(&ResourceId::from("f12")).await, 0);
    }

    #[tokio::test]
    async fn test_rollback_disabled_leaves_new_revision() {
        let plane = plane_with("f13").await;
        plane.inject(ResourceId::from("f13"), Fault::IgnoreMutation).await;
        let machine = AttemptMachine::new(
            plane.clone(),
            AttemptSettings {
                rollback_enabled: false,
                ..settings()
            },
        );

        let record = machine.execute(timeout_plan("f13")).await;

        assert!(matches!(
            record.outcome,
            AttemptOutcome::Failed {
                stage: FailureStage::Verify,
                compensation: Compensation::Disabled,
                ..
            }
        ));
    }
}
