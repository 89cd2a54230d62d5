//! Static remediation policy.
//!
//! Maps every [`ErrorCategory`] to a [`RemediationDescriptor`] and scores
//! classifications. All functions here are pure and deterministic.

use crate::domain::models::{
    CatalogConfig, ClassificationResult, Confidence, ErrorCategory, PolicyDecision,
    RemediationAction, RemediationDescriptor,
};

/// Samples below which confidence is always low.
const MIN_SAMPLES_MEDIUM: u32 = 3;
/// Samples below which confidence is at most medium.
const MIN_SAMPLES_HIGH: u32 = 10;
/// Share of the dominant category required for high confidence.
const HIGH_CONFIDENCE_RATIO: f64 = 0.8;
/// Samples per unit of priority scaling.
const PRIORITY_SAMPLE_UNIT: f64 = 5.0;
const MAX_PRIORITY_SCALE: f64 = 2.0;
const MAX_PRIORITY: f64 = 10.0;

/// Confidence for `category_samples` out of `total_samples`.
pub fn confidence(total_samples: u32, category_samples: u32) -> Confidence {
    if total_samples < MIN_SAMPLES_MEDIUM {
        return Confidence::Low;
    }
    if total_samples < MIN_SAMPLES_HIGH {
        return Confidence::Medium;
    }
    if f64::from(category_samples) / f64::from(total_samples) > HIGH_CONFIDENCE_RATIO {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Base priority scaled by sample volume, capped at 10.
pub fn scaled_priority(base: u8, total_samples: u32) -> f64 {
    let scale = (f64::from(total_samples) / PRIORITY_SAMPLE_UNIT).min(MAX_PRIORITY_SCALE);
    (f64::from(base) * scale).min(MAX_PRIORITY)
}

/// Policy table, built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct RemediationCatalog {
    descriptors: Vec<RemediationDescriptor>,
}

impl Default for RemediationCatalog {
    fn default() -> Self {
        Self::new(&CatalogConfig::default())
    }
}

impl RemediationCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        let descriptors = ErrorCategory::ALL
            .iter()
            .map(|category| Self::descriptor_for(*category, config))
            .collect();
        Self { descriptors }
    }

    fn descriptor_for(category: ErrorCategory, config: &CatalogConfig) -> RemediationDescriptor {
        let (auto_fixable, priority, action, guidance) = match category {
            ErrorCategory::Timeout => (
                true,
                8,
                RemediationAction::RaiseTimeout {
                    ceiling_secs: config.timeout_ceiling_secs,
                },
                "Invocations exceed the configured timeout. Raise the timeout or look for slow downstream calls.",
            ),
            ErrorCategory::Memory => (
                true,
                9,
                RemediationAction::RaiseMemory {
                    multiplier: config.memory_multiplier,
                    ceiling_mb: config.memory_ceiling_mb,
                },
                "The runtime is running out of memory. Raise the memory allocation or reduce working-set size.",
            ),
            ErrorCategory::Permission => (
                false,
                7,
                RemediationAction::ManualReview,
                "The execution role lacks a permission. Grant the missing action on the execution role.",
            ),
            ErrorCategory::Dependency => (
                true,
                6,
                RemediationAction::RepackageDependencies,
                "A module could not be loaded. Rebuild the package with its dependencies bundled.",
            ),
            ErrorCategory::Syntax => (
                false,
                5,
                RemediationAction::ManualReview,
                "The deployed code does not parse. Fix the source and redeploy.",
            ),
            ErrorCategory::Runtime => (
                false,
                4,
                RemediationAction::ManualReview,
                "The code raised an unhandled exception. Inspect the stack trace and fix the handler.",
            ),
            ErrorCategory::Other => (
                false,
                1,
                RemediationAction::ManualReview,
                "The errors did not match a known pattern. Review recent logs manually.",
            ),
        };

        RemediationDescriptor {
            category,
            auto_fixable,
            priority,
            action,
            guidance: guidance.to_string(),
        }
    }

    /// Descriptor for `category`. Total over the enum.
    pub fn lookup(&self, category: ErrorCategory) -> &RemediationDescriptor {
        &self.descriptors[category as usize]
    }

    /// Base priority of `category` scaled by `total_samples`.
    pub fn priority(&self, category: ErrorCategory, total_samples: u32) -> f64 {
        scaled_priority(self.lookup(category).priority, total_samples)
    }

    /// Policy verdict for the dominant category of a classification.
    pub fn evaluate(&self, classification: &ClassificationResult) -> PolicyDecision {
        let descriptor = self.lookup(classification.dominant).clone();
        PolicyDecision {
            confidence: confidence(classification.total, classification.dominant_count()),
            priority: scaled_priority(descriptor.priority, classification.total),
            descriptor,
        }
    }

    pub fn descriptors(&self) -> &[RemediationDescriptor] {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActionKind, CategoryCounts};

    #[test]
    fn test_every_category_has_an_entry() {
        let catalog = RemediationCatalog::default();
        for category in ErrorCategory::ALL {
            let descriptor = catalog.lookup(category);
            assert_eq!(descriptor.category, category);
            assert!((1..=10).contains(&descriptor.priority));
            if descriptor.auto_fixable {
                assert_ne!(descriptor.action.kind(), ActionKind::Manual);
            }
        }
        assert!(!catalog.lookup(ErrorCategory::Other).auto_fixable);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence(0, 0), Confidence::Low);
        assert_eq!(confidence(2, 2), Confidence::Low);
        assert_eq!(confidence(3, 3), Confidence::Medium);
        assert_eq!(confidence(9, 9), Confidence::Medium);
        assert_eq!(confidence(10, 9), Confidence::High);
        assert_eq!(confidence(10, 8), Confidence::Medium);
        assert_eq!(confidence(12, 12), Confidence::High);
    }

    #[test]
    fn test_priority_scaling() {
        let catalog = RemediationCatalog::default();
        assert!((catalog.priority(ErrorCategory::Timeout, 0)).abs() < f64::EPSILON);
        assert!((catalog.priority(ErrorCategory::Timeout, 5) - 8.0).abs() < f64::EPSILON);
        assert!((catalog.priority(ErrorCategory::Timeout, 12) - 10.0).abs() < f64::EPSILON);
        assert!((catalog.priority(ErrorCategory::Runtime, 10) - 8.0).abs() < f64::EPSILON);
        assert!((catalog.priority(ErrorCategory::Dependency, 3) - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_ceilings_come_from_config() {
        let catalog = RemediationCatalog::new(&CatalogConfig {
            timeout_ceiling_secs: 120,
            memory_ceiling_mb: 1024,
            memory_multiplier: 4,
        });
        assert_eq!(
            catalog.lookup(ErrorCategory::Timeout).action,
            RemediationAction::RaiseTimeout { ceiling_secs: 120 }
        );
        assert_eq!(
            catalog.lookup(ErrorCategory::Memory).action,
            RemediationAction::RaiseMemory {
                multiplier: 4,
                ceiling_mb: 1024
            }
        );
    }

    #[test]
    fn test_evaluate_uses_dominant_category() {
        let mut counts = CategoryCounts::default();
        for _ in 0..12 {
            counts.increment(ErrorCategory::Timeout);
        }
        let decision =
            RemediationCatalog::default().evaluate(&ClassificationResult::from_counts(counts));
        assert_eq!(decision.descriptor.category, ErrorCategory::Timeout);
        assert_eq!(decision.confidence, Confidence::High);
        assert!((decision.priority - 10.0).abs() < f64::EPSILON);
    }
}
