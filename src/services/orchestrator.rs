//! Remediation orchestrator.
//!
//! Runs one monitoring cycle: observe every configured resource, gate the
//! degraded ones, execute admitted attempts in sequential batches of
//! concurrently spawned tasks, then update the cooldown table and build the
//! run summary.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{CycleError, CycleResult, RemediationError};
use crate::domain::models::{
    AttemptOutcome, AttemptRecord, ClassificationResult, Config, CooldownTable, CycleConfig,
    PolicyDecision, ResourceId, ResourceReport, ResourceStatus, RunSummary, SkipReason,
    MAX_COOLDOWN_SECS,
};
use crate::domain::ports::{ControlPlane, CooldownStore, DiagnosticFilter, SignalSource};
use crate::infrastructure::logging::journal::AttemptJournal;
use crate::services::attempt_machine::{AttemptMachine, AttemptPlan, AttemptSettings};
use crate::services::classifier::Classifier;
use crate::services::eligibility::{Eligibility, EligibilityGate};
use crate::services::remediation_catalog::RemediationCatalog;

/// Progress events emitted during a cycle.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    /// Cycle started.
    Started { cycle_id: Uuid, resources: usize },
    /// Resource skipped by the eligibility gate or the deadline.
    ResourceSkipped {
        resource_id: ResourceId,
        reason: SkipReason,
    },
    /// Batch started.
    BatchStarted {
        batch_number: usize,
        resources: Vec<ResourceId>,
    },
    /// Attempt reached a terminal state.
    AttemptFinished { record: AttemptRecord },
    /// Batch fully joined.
    BatchCompleted {
        batch_number: usize,
        committed: usize,
        not_committed: usize,
    },
    /// Deadline passed with batches still pending.
    DeadlineReached { remaining: usize },
    /// Cycle completed.
    Completed { summary: Box<RunSummary> },
}

/// What monitoring learned about one resource.
#[derive(Debug, Clone)]
enum Observation {
    Unavailable {
        error_count: Option<u64>,
        reason: String,
    },
    Healthy {
        error_count: u64,
    },
    Degraded {
        error_count: u64,
        classification: ClassificationResult,
    },
}

/// A resource admitted for an attempt.
#[derive(Debug, Clone)]
struct Candidate {
    index: usize,
    resource_id: ResourceId,
    error_count: u64,
    classification: ClassificationResult,
    decision: PolicyDecision,
}

/// Orchestrates monitoring cycles over a set of resources.
pub struct RemediationOrchestrator {
    signals: Arc<dyn SignalSource>,
    control: Arc<dyn ControlPlane>,
    classifier: Classifier,
    catalog: RemediationCatalog,
    event_tx: Option<mpsc::Sender<CycleEvent>>,
    journal: Option<AttemptJournal>,
}

impl RemediationOrchestrator {
    pub fn new(signals: Arc<dyn SignalSource>, control: Arc<dyn ControlPlane>) -> Self {
        Self {
            signals,
            control,
            classifier: Classifier::new(),
            catalog: RemediationCatalog::default(),
            event_tx: None,
            journal: None,
        }
    }

    /// Build an orchestrator from the loaded configuration: catalog
    /// parameters from `config.catalog`, and an attempt journal when
    /// `config.logging.journal_path` is set.
    pub async fn from_config(
        signals: Arc<dyn SignalSource>,
        control: Arc<dyn ControlPlane>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let mut orchestrator =
            Self::new(signals, control).with_catalog(RemediationCatalog::new(&config.catalog));
        if let Some(path) = &config.logging.journal_path {
            let journal = AttemptJournal::open(path).await?;
            info!(path = %journal.path().display(), "journaling attempts");
            orchestrator = orchestrator.with_journal(journal);
        }
        Ok(orchestrator)
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: RemediationCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Send progress events to `tx`. A closed receiver is ignored.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<CycleEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Append every attempt record to `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: AttemptJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn catalog(&self) -> &RemediationCatalog {
        &self.catalog
    }

    /// Load the cooldown table from `store`, run one cycle and save it back.
    pub async fn run_persisted(
        &self,
        config: &CycleConfig,
        store: &dyn CooldownStore,
    ) -> anyhow::Result<RunSummary> {
        let mut cooldowns = store.load().await?;
        let summary = self.run_cycle(config, &mut cooldowns).await?;
        store.save(&cooldowns).await?;
        Ok(summary)
    }

    /// Run one monitoring cycle.
    ///
    /// Fails only on invalid configuration or when no resource's signals
    /// could be read. Every other failure is scoped to its resource and
    /// reported in the summary.
    #[instrument(name = "cycle", skip_all, fields(resources = config.resources.len()))]
    pub async fn run_cycle(
        &self,
        config: &CycleConfig,
        cooldowns: &mut CooldownTable,
    ) -> CycleResult<RunSummary> {
        validate(config)?;

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let resource_ids = config.resource_ids();
        info!(cycle_id = %cycle_id, "starting remediation cycle");
        self.emit(CycleEvent::Started {
            cycle_id,
            resources: resource_ids.len(),
        })
        .await;

        let observations = self.monitor(config, &resource_ids).await;
        if observations
            .iter()
            .all(|o| matches!(o, Observation::Unavailable { .. }))
        {
            error!(resources = resource_ids.len(), "signal source unavailable for every resource");
            return Err(CycleError::SignalOutage {
                resources: resource_ids.len(),
            });
        }

        let gate = EligibilityGate::from_config(config);
        let now = Utc::now();
        let mut reports: Vec<Option<ResourceReport>> = vec![None; resource_ids.len()];
        let mut candidates = Vec::new();

        for (index, (resource_id, observation)) in
            resource_ids.iter().zip(observations).enumerate()
        {
            match observation {
                Observation::Unavailable {
                    error_count,
                    reason,
                } => {
                    reports[index] = Some(ResourceReport {
                        resource_id: resource_id.clone(),
                        error_count,
                        classification: None,
                        status: ResourceStatus::Error { reason },
                    });
                }
                Observation::Healthy { error_count } => {
                    reports[index] = Some(ResourceReport {
                        resource_id: resource_id.clone(),
                        error_count: Some(error_count),
                        classification: None,
                        status: ResourceStatus::Healthy,
                    });
                }
                Observation::Degraded {
                    error_count,
                    classification,
                } => {
                    let decision = self.catalog.evaluate(&classification);
                    debug!(
                        resource = %resource_id,
                        category = %classification.dominant,
                        confidence = %decision.confidence,
                        priority = decision.priority,
                        "resource degraded"
                    );
                    match gate.evaluate(cooldowns, resource_id, decision, now) {
                        Eligibility::Admit(decision) => candidates.push(Candidate {
                            index,
                            resource_id: resource_id.clone(),
                            error_count,
                            classification,
                            decision,
                        }),
                        Eligibility::Skip(reason) => {
                            self.emit(CycleEvent::ResourceSkipped {
                                resource_id: resource_id.clone(),
                                reason: reason.clone(),
                            })
                            .await;
                            reports[index] = Some(ResourceReport {
                                resource_id: resource_id.clone(),
                                error_count: Some(error_count),
                                classification: Some(classification),
                                status: ResourceStatus::Skipped { reason },
                            });
                        }
                    }
                }
            }
        }

        // Stable: equal priorities keep configuration order.
        candidates.sort_by(|a, b| b.decision.priority.total_cmp(&a.decision.priority));

        let machine = AttemptMachine::new(self.control.clone(), AttemptSettings::from(config));
        let batches: Vec<&[Candidate]> = candidates.chunks(config.max_concurrent_fixes).collect();
        let mut executed = Vec::new();
        let mut attempts = Vec::new();
        let mut deadline_reached = false;

        for (batch_index, batch) in batches.iter().enumerate() {
            if batch_index > 0 && !config.batch_delay().is_zero() {
                tokio::time::sleep(config.batch_delay()).await;
            }

            if clock.elapsed() >= config.cycle_deadline() {
                let remaining: Vec<&Candidate> =
                    batches[batch_index..].iter().flat_map(|b| b.iter()).collect();
                warn!(
                    remaining = remaining.len(),
                    elapsed_ms = clock.elapsed().as_millis(),
                    "cycle deadline reached, not starting further batches"
                );
                self.emit(CycleEvent::DeadlineReached {
                    remaining: remaining.len(),
                })
                .await;
                for candidate in remaining {
                    reports[candidate.index] = Some(ResourceReport {
                        resource_id: candidate.resource_id.clone(),
                        error_count: Some(candidate.error_count),
                        classification: Some(candidate.classification.clone()),
                        status: ResourceStatus::Skipped {
                            reason: SkipReason::DeadlineReached,
                        },
                    });
                }
                deadline_reached = true;
                break;
            }

            let batch_number = batch_index + 1;
            let ids: Vec<ResourceId> = batch.iter().map(|c| c.resource_id.clone()).collect();
            info!(batch_number, size = ids.len(), "starting remediation batch");
            self.emit(CycleEvent::BatchStarted {
                batch_number,
                resources: ids.clone(),
            })
            .await;

            let records = run_batch(&machine, batch).await;

            let committed = records.iter().filter(|r| r.outcome.is_committed()).count();
            for (candidate, record) in batch.iter().zip(&records) {
                reports[candidate.index] = Some(ResourceReport {
                    resource_id: candidate.resource_id.clone(),
                    error_count: Some(candidate.error_count),
                    classification: Some(candidate.classification.clone()),
                    status: ResourceStatus::Attempted {
                        outcome: record.outcome.clone(),
                    },
                });
                self.emit(CycleEvent::AttemptFinished {
                    record: record.clone(),
                })
                .await;
            }
            self.emit(CycleEvent::BatchCompleted {
                batch_number,
                committed,
                not_committed: records.len() - committed,
            })
            .await;

            executed.push(ids);
            attempts.extend(records);
        }

        for record in &attempts {
            cooldowns.record_attempt(
                &record.resource_id,
                record.finished_at,
                record.outcome.is_committed(),
            );
        }

        if let Some(journal) = &self.journal {
            for record in &attempts {
                if let Err(e) = journal.append(record).await {
                    warn!(resource = %record.resource_id, error = %e, "failed to journal attempt");
                }
            }
        }

        let resources = reports.into_iter().flatten().collect();
        let summary = RunSummary::build(
            cycle_id,
            started_at,
            resources,
            attempts,
            executed,
            deadline_reached,
        );
        log_summary(&summary);

        self.emit(CycleEvent::Completed {
            summary: Box::new(summary.clone()),
        })
        .await;

        Ok(summary)
    }

    /// Observe every resource, at most `monitor_concurrency` at a time.
    /// Results keep the input order.
    async fn monitor(&self, config: &CycleConfig, resource_ids: &[ResourceId]) -> Vec<Observation> {
        stream::iter(resource_ids)
            .map(|resource_id| self.observe(config, resource_id))
            .buffered(config.monitor_concurrency)
            .collect()
            .await
    }

    async fn observe(&self, config: &CycleConfig, resource_id: &ResourceId) -> Observation {
        let window = match self
            .signals
            .error_window(resource_id, config.error_window())
            .await
        {
            Ok(window) => window,
            Err(e) => {
                let err = RemediationError::SignalUnavailable {
                    resource: resource_id.clone(),
                    reason: e.to_string(),
                };
                warn!(resource = %resource_id, error = %err, "error window unavailable");
                return Observation::Unavailable {
                    error_count: None,
                    reason: err.to_string(),
                };
            }
        };

        debug!(
            resource = %resource_id,
            error_count = window.error_count,
            error_rate = window.error_rate(),
            "error window read"
        );
        if window.error_count < config.error_threshold {
            return Observation::Healthy {
                error_count: window.error_count,
            };
        }

        let filter = DiagnosticFilter::new(&config.diagnostics_filter, config.diagnostics_limit);
        match self
            .signals
            .diagnostics(resource_id, config.error_window(), &filter)
            .await
        {
            Ok(samples) => Observation::Degraded {
                error_count: window.error_count,
                classification: self.classifier.classify(&samples),
            },
            Err(e) => {
                let err = RemediationError::SignalUnavailable {
                    resource: resource_id.clone(),
                    reason: e.to_string(),
                };
                warn!(resource = %resource_id, error = %err, "diagnostics unavailable");
                Observation::Unavailable {
                    error_count: Some(window.error_count),
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn emit(&self, event: CycleEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Spawn one task per candidate and join them all. A task that panics is
/// recorded as an aborted attempt; siblings are unaffected.
async fn run_batch(machine: &AttemptMachine, batch: &[Candidate]) -> Vec<AttemptRecord> {
    let mut handles = Vec::with_capacity(batch.len());
    for candidate in batch {
        let plan = AttemptPlan {
            resource_id: candidate.resource_id.clone(),
            category: candidate.decision.descriptor.category,
            action: candidate.decision.descriptor.action.clone(),
        };
        let machine = machine.clone();
        let task_plan = plan.clone();
        let started_at: DateTime<Utc> = Utc::now();
        let handle = tokio::spawn(async move { machine.execute(task_plan).await });
        handles.push((plan, started_at, handle));
    }

    let mut records = Vec::with_capacity(handles.len());
    for (plan, started_at, handle) in handles {
        let record = match handle.await {
            Ok(record) => record,
            Err(e) => {
                error!(
                    resource = %plan.resource_id,
                    error = %e,
                    "attempt task aborted; resource state unknown, operator attention required"
                );
                AttemptRecord::aborted(
                    plan.resource_id,
                    plan.category,
                    plan.action,
                    started_at,
                    format!("attempt task aborted: {e}"),
                )
            }
        };
        records.push(record);
    }
    records
}

fn validate(config: &CycleConfig) -> CycleResult<()> {
    if config.resources.is_empty() {
        return Err(CycleError::InvalidConfig(
            "resource list must not be empty".to_string(),
        ));
    }
    if config.max_concurrent_fixes == 0 {
        return Err(CycleError::InvalidConfig(
            "max_concurrent_fixes must be at least 1".to_string(),
        ));
    }
    if config.monitor_concurrency == 0 {
        return Err(CycleError::InvalidConfig(
            "monitor_concurrency must be at least 1".to_string(),
        ));
    }
    if config.cooldown_secs > MAX_COOLDOWN_SECS {
        return Err(CycleError::InvalidConfig(format!(
            "cooldown_secs must be at most {MAX_COOLDOWN_SECS}"
        )));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = config.resources.iter().find(|r| !seen.insert(r.as_str())) {
        return Err(CycleError::InvalidConfig(format!(
            "resource '{duplicate}' listed more than once"
        )));
    }
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    info!(
        cycle_id = %summary.cycle_id,
        monitored = summary.monitored,
        with_errors = summary.with_errors,
        fixed = summary.fixed,
        failed = summary.failed,
        rolled_back = summary.rolled_back,
        skipped = summary.skipped,
        errored = summary.errored,
        batches = summary.batches.len(),
        deadline_reached = summary.deadline_reached,
        "remediation cycle complete"
    );
    for record in summary.requiring_operator() {
        error!(
            resource = %record.resource_id,
            reason = ?record.outcome.reason(),
            "attempt left resource requiring manual remediation"
        );
    }
    for record in &summary.attempts {
        if let AttemptOutcome::Failed { stage, reason, .. } = &record.outcome {
            debug!(resource = %record.resource_id, stage = stage.as_str(), reason = %reason, "attempt failed");
        }
    }
}
