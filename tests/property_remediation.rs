use chrono::{Duration, TimeZone, Utc};
use mender::domain::models::{CooldownEntry, DiagnosticSample, GatePolicy};
use mender::services::remediation_catalog::{confidence, scaled_priority};
use mender::{Classifier, CooldownTable, ResourceId};
use proptest::prelude::*;

fn sample_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Task timed out after 3.00 seconds".to_string()),
        Just("FATAL ERROR: heap out of memory".to_string()),
        Just("AccessDenied: not authorized".to_string()),
        Just("No module named 'requests'".to_string()),
        Just("SyntaxError: invalid syntax".to_string()),
        Just("TypeError: undefined is not a function".to_string()),
        "[a-zA-Z0-9 :._-]{0,60}",
    ]
}

proptest! {
    /// Property: every sample lands in exactly one category
    #[test]
    fn prop_classifier_counts_sum_to_input_length(
        lines in prop::collection::vec(sample_line(), 0..80)
    ) {
        let samples: Vec<DiagnosticSample> = lines
            .iter()
            .map(|l| DiagnosticSample::new(l.clone(), "stream"))
            .collect();

        let result = Classifier::new().classify(&samples);

        let summed: u32 = result.counts.iter().map(|(_, n)| n).sum();
        prop_assert_eq!(summed as usize, samples.len());
        prop_assert_eq!(result.total as usize, samples.len());
    }

    /// Property: the dominant category has the highest count
    #[test]
    fn prop_dominant_has_max_count(
        lines in prop::collection::vec(sample_line(), 1..80)
    ) {
        let samples: Vec<DiagnosticSample> = lines
            .iter()
            .map(|l| DiagnosticSample::new(l.clone(), "stream"))
            .collect();

        let result = Classifier::new().classify(&samples);
        let max = result.counts.iter().map(|(_, n)| n).max().unwrap_or(0);
        prop_assert_eq!(result.dominant_count(), max);
    }

    /// Property: for a fixed ratio of at least 0.8, more samples never lower confidence
    #[test]
    fn prop_confidence_monotonic_in_total(
        (den, num) in (1u32..50).prop_flat_map(|den| (Just(den), (den * 4).div_ceil(5)..=den)),
        k in 1u32..20,
        extra in 1u32..20,
    ) {
        let small = confidence(den * k, num * k);
        let large = confidence(den * (k + extra), num * (k + extra));
        prop_assert!(small <= large, "{num}/{den} x{k} -> {small:?}, x{} -> {large:?}", k + extra);
    }

    /// Property: priority stays within 0..=10 and grows with samples
    #[test]
    fn prop_priority_bounded_and_monotonic(
        base in 1u8..=10,
        total in 0u32..100,
        extra in 0u32..100,
    ) {
        let p = scaled_priority(base, total);
        prop_assert!((0.0..=10.0).contains(&p));
        prop_assert!(scaled_priority(base, total + extra) >= p);
    }

    /// Property: an open circuit is never admitted before the stale window
    #[test]
    fn prop_open_circuit_blocks_until_stale(
        cooldown_secs in 1i64..7_200,
        elapsed_frac in 0.0f64..=1.0,
        failures in 3u32..10,
    ) {
        let policy = GatePolicy {
            cooldown: Duration::seconds(cooldown_secs),
            failure_threshold: 3,
            stale_reset_factor: 2,
        };
        let last = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let stale_ms = policy.stale_after().num_milliseconds();
        let elapsed = Duration::milliseconds((stale_ms as f64 * elapsed_frac) as i64);
        let id = ResourceId::from("r");
        let mut table = CooldownTable::from_entries([CooldownEntry {
            resource_id: id.clone(),
            last_attempt_at: last,
            consecutive_failures: failures,
        }]);

        let decision = table.check(&id, last + elapsed, &policy);
        prop_assert!(!decision.is_admitted());

        let after = last + policy.stale_after() + Duration::milliseconds(1);
        prop_assert!(table.check(&id, after, &policy).is_admitted());
    }
}

#[test]
fn open_circuit_exactly_at_threshold_with_elapsed_cooldown() {
    let policy = GatePolicy::default();
    let last = Utc::now();
    let id = ResourceId::from("f3");
    let mut table = CooldownTable::from_entries([CooldownEntry {
        resource_id: id.clone(),
        last_attempt_at: last,
        consecutive_failures: 3,
    }]);

    for minutes in [1, 5, 6, 9, 10] {
        assert!(
            !table
                .check(&id, last + Duration::minutes(minutes), &policy)
                .is_admitted(),
            "admitted after {minutes} minutes"
        );
    }
    assert!(table
        .check(&id, last + Duration::minutes(11), &policy)
        .is_admitted());
}
