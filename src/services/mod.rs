//! Remediation services: classification, policy, eligibility, attempt
//! execution and cycle orchestration.

pub mod attempt_machine;
pub mod classifier;
pub mod eligibility;
pub mod orchestrator;
pub mod remediation_catalog;

pub use attempt_machine::{AttemptMachine, AttemptPlan, AttemptSettings};
pub use classifier::Classifier;
pub use eligibility::{Eligibility, EligibilityGate};
pub use orchestrator::{CycleEvent, RemediationOrchestrator};
pub use remediation_catalog::{confidence, scaled_priority, RemediationCatalog};
