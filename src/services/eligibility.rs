//! Eligibility gate.
//!
//! Decides whether a degraded resource may be attempted this cycle. The
//! cooldown table is consulted first, then the policy verdict for the
//! resource's dominant category.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::models::{
    Confidence, CooldownTable, CycleConfig, GateDecision, GatePolicy, PolicyDecision, ResourceId,
    SkipReason,
};

/// Result of gating one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Admit(PolicyDecision),
    Skip(SkipReason),
}

impl Eligibility {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit(_))
    }
}

/// Cooldown, circuit-breaker and auto-fix thresholds for one cycle.
#[derive(Debug, Clone)]
pub struct EligibilityGate {
    policy: GatePolicy,
    auto_fix_enabled: bool,
    min_confidence: Confidence,
    min_priority: f64,
}

impl EligibilityGate {
    pub fn new(
        policy: GatePolicy,
        auto_fix_enabled: bool,
        min_confidence: Confidence,
        min_priority: f64,
    ) -> Self {
        Self {
            policy,
            auto_fix_enabled,
            min_confidence,
            min_priority,
        }
    }

    pub fn from_config(config: &CycleConfig) -> Self {
        Self::new(
            config.gate_policy(),
            config.auto_fix_enabled,
            config.min_confidence,
            config.min_priority,
        )
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Gate `resource_id`. Stale cooldown entries are discarded from `table`
    /// as a side effect.
    pub fn evaluate(
        &self,
        table: &mut CooldownTable,
        resource_id: &ResourceId,
        decision: PolicyDecision,
        now: DateTime<Utc>,
    ) -> Eligibility {
        match table.check(resource_id, now, &self.policy) {
            GateDecision::Admit => {}
            GateDecision::CoolingDown { retry_after } => {
                debug!(resource = %resource_id, retry_after = %retry_after, "resource cooling down");
                return Eligibility::Skip(SkipReason::CoolingDown { retry_after });
            }
            GateDecision::CircuitOpen {
                consecutive_failures,
                resets_after,
            } => {
                info!(
                    resource = %resource_id,
                    consecutive_failures,
                    resets_after = %resets_after,
                    "circuit open, skipping resource"
                );
                return Eligibility::Skip(SkipReason::CircuitOpen {
                    consecutive_failures,
                    resets_after,
                });
            }
        }

        if !self.auto_fix_enabled {
            return Eligibility::Skip(SkipReason::AutoFixDisabled);
        }

        if !decision.descriptor.auto_fixable {
            return Eligibility::Skip(SkipReason::NotAutoFixable {
                category: decision.descriptor.category,
            });
        }

        if decision.confidence < self.min_confidence || decision.priority < self.min_priority {
            return Eligibility::Skip(SkipReason::BelowThreshold {
                confidence: decision.confidence,
                priority: decision.priority,
            });
        }

        Eligibility::Admit(decision)
    }
}
