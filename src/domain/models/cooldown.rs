//! Cooldown and circuit-breaker bookkeeping.
//!
//! The [`CooldownTable`] is the only state carried from one cycle to the next.
//! It has a single owner: cycles borrow it mutably, and entries are written
//! only after an attempt has reached a terminal state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::resource::ResourceId;

/// Per-resource attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub resource_id: ResourceId,
    pub last_attempt_at: DateTime<Utc>,
    pub consecutive_failures: u32,
}

/// Thresholds for the cooldown gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// Minimum time between attempts on the same resource.
    pub cooldown: Duration,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Entries older than `cooldown * stale_reset_factor` are discarded.
    pub stale_reset_factor: u32,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(5),
            failure_threshold: 3,
            stale_reset_factor: 2,
        }
    }
}

impl GatePolicy {
    /// Saturates at [`Duration::MAX`], meaning an entry never goes stale.
    pub fn stale_after(&self) -> Duration {
        i32::try_from(self.stale_reset_factor)
            .ok()
            .and_then(|factor| self.cooldown.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Verdict of the cooldown gate for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No blocking history.
    Admit,
    /// Too soon after the previous attempt.
    CoolingDown { retry_after: DateTime<Utc> },
    /// Too many consecutive failures; stays open until the stale reset.
    CircuitOpen {
        consecutive_failures: u32,
        resets_after: DateTime<Utc>,
    },
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Single-owner table of cooldown entries keyed by resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownTable {
    entries: HashMap<ResourceId, CooldownEntry>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CooldownEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.resource_id.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, resource_id: &ResourceId) -> Option<&CooldownEntry> {
        self.entries.get(resource_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by resource id.
    pub fn entries(&self) -> Vec<&CooldownEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        entries
    }

    /// Evaluate the gate for `resource_id` at `now`.
    ///
    /// A stale entry (older than the stale-reset window) is discarded and the
    /// resource admitted. Otherwise an open circuit blocks regardless of
    /// elapsed cooldown, and a recent attempt blocks until the cooldown ends.
    pub fn check(
        &mut self,
        resource_id: &ResourceId,
        now: DateTime<Utc>,
        policy: &GatePolicy,
    ) -> GateDecision {
        let Some(entry) = self.entries.get(resource_id) else {
            return GateDecision::Admit;
        };

        let elapsed = now - entry.last_attempt_at;
        if elapsed > policy.stale_after() {
            tracing::debug!(
                resource = %resource_id,
                consecutive_failures = entry.consecutive_failures,
                "discarding stale cooldown entry"
            );
            self.entries.remove(resource_id);
            return GateDecision::Admit;
        }

        if entry.consecutive_failures >= policy.failure_threshold {
            return GateDecision::CircuitOpen {
                consecutive_failures: entry.consecutive_failures,
                resets_after: saturating_add(entry.last_attempt_at, policy.stale_after()),
            };
        }

        if elapsed < policy.cooldown {
            return GateDecision::CoolingDown {
                retry_after: saturating_add(entry.last_attempt_at, policy.cooldown),
            };
        }

        GateDecision::Admit
    }

    /// Record a terminal attempt. Success resets the failure streak.
    pub fn record_attempt(&mut self, resource_id: &ResourceId, at: DateTime<Utc>, success: bool) {
        let entry = self
            .entries
            .entry(resource_id.clone())
            .or_insert_with(|| CooldownEntry {
                resource_id: resource_id.clone(),
                last_attempt_at: at,
                consecutive_failures: 0,
            });
        entry.last_attempt_at = at;
        if success {
            entry.consecutive_failures = 0;
        } else {
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        }
    }

    /// Insert or replace an entry verbatim.
    pub fn insert(&mut self, entry: CooldownEntry) {
        self.entries.insert(entry.resource_id.clone(), entry);
    }
}

fn saturating_add(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, minutes_ago: i64, failures: u32, now: DateTime<Utc>) -> CooldownEntry {
        CooldownEntry {
            resource_id: ResourceId::from(id),
            last_attempt_at: now - Duration::minutes(minutes_ago),
            consecutive_failures: failures,
        }
    }

    #[test]
    fn test_unknown_resource_is_admitted() {
        let mut table = CooldownTable::new();
        let decision = table.check(&ResourceId::from("f1"), Utc::now(), &GatePolicy::default());
        assert_eq!(decision, GateDecision::Admit);
    }

    #[test]
    fn test_recent_attempt_is_cooling_down() {
        let now = Utc::now();
        let mut table = CooldownTable::from_entries([entry("f1", 2, 0, now)]);
        let decision = table.check(&ResourceId::from("f1"), now, &GatePolicy::default());
        assert!(matches!(decision, GateDecision::CoolingDown { .. }));
    }

    #[test]
    fn test_elapsed_cooldown_admits() {
        let now = Utc::now();
        let mut table = CooldownTable::from_entries([entry("f1", 6, 1, now)]);
        let decision = table.check(&ResourceId::from("f1"), now, &GatePolicy::default());
        assert_eq!(decision, GateDecision::Admit);
        assert!(table.get(&ResourceId::from("f1")).is_some());
    }

    #[test]
    fn test_open_circuit_blocks_after_cooldown() {
        let now = Utc::now();
        let mut table = CooldownTable::from_entries([entry("f3", 7, 3, now)]);
        let decision = table.check(&ResourceId::from("f3"), now, &GatePolicy::default());
        assert!(matches!(
            decision,
            GateDecision::CircuitOpen {
                consecutive_failures: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_stale_entry_is_discarded() {
        let now = Utc::now();
        let mut table = CooldownTable::from_entries([entry("f3", 11, 3, now)]);
        let decision = table.check(&ResourceId::from("f3"), now, &GatePolicy::default());
        assert_eq!(decision, GateDecision::Admit);
        assert!(table.is_empty());
    }

    #[test]
    fn test_oversized_windows_saturate() {
        let policy = GatePolicy {
            cooldown: Duration::seconds(i64::MAX / 1_000),
            failure_threshold: 3,
            stale_reset_factor: 2,
        };
        assert_eq!(policy.stale_after(), Duration::MAX);

        let now = Utc::now();
        let mut table =
            CooldownTable::from_entries([entry("f1", 1, 0, now), entry("f3", 1, 3, now)]);
        assert_eq!(
            table.check(&ResourceId::from("f1"), now, &policy),
            GateDecision::CoolingDown {
                retry_after: DateTime::<Utc>::MAX_UTC
            }
        );
        assert_eq!(
            table.check(&ResourceId::from("f3"), now, &policy),
            GateDecision::CircuitOpen {
                consecutive_failures: 3,
                resets_after: DateTime::<Utc>::MAX_UTC
            }
        );
    }

    #[test]
    fn test_record_attempt_tracks_streak() {
        let mut table = CooldownTable::new();
        let id = ResourceId::from("f2");
        let now = Utc::now();
        table.record_attempt(&id, now, false);
        table.record_attempt(&id, now, false);
        assert_eq!(table.get(&id).unwrap().consecutive_failures, 2);
        table.record_attempt(&id, now, true);
        assert_eq!(table.get(&id).unwrap().consecutive_failures, 0);
    }
}
