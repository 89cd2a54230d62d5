//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mender::adapters::memory::{InMemoryControlPlane, StaticSignalSource};
use mender::domain::models::ResourceConfig;
use mender::{CycleConfig, RemediationOrchestrator, ResourceId};

pub const TIMEOUT_LINE: &str = "2024-05-01T10:00:00Z ERROR Task timed out after 3.00 seconds";
pub const MEMORY_LINE: &str = "Runtime exited with error: signal: killed";
pub const DEPENDENCY_LINE: &str = "Runtime.ImportModuleError: Error: Cannot find module 'axios'";
pub const PERMISSION_LINE: &str = "AccessDeniedException: User is not authorized to perform s3:GetObject";

pub fn initial_config() -> ResourceConfig {
    ResourceConfig {
        timeout_secs: 3,
        memory_mb: 128,
    }
}

/// Signal source, control plane and orchestrator over the same resources.
pub struct Harness {
    pub signals: Arc<StaticSignalSource>,
    pub plane: Arc<InMemoryControlPlane>,
}

impl Harness {
    pub async fn new(resources: &[&str]) -> Self {
        Self::with_plane(resources, InMemoryControlPlane::new("live")).await
    }

    pub async fn with_latency(resources: &[&str], latency: Duration) -> Self {
        Self::with_plane(resources, InMemoryControlPlane::new("live").with_latency(latency)).await
    }

    async fn with_plane(resources: &[&str], plane: InMemoryControlPlane) -> Self {
        let signals = Arc::new(StaticSignalSource::new());
        for r in resources {
            plane.register(ResourceId::from(*r), initial_config()).await;
            signals.set_errors(ResourceId::from(*r), 0, 100).await;
        }
        Self {
            signals,
            plane: Arc::new(plane),
        }
    }

    /// Mark `resource` degraded with `count` copies of `line`.
    pub async fn degrade(&self, resource: &str, line: &str, count: usize) {
        let id = ResourceId::from(resource);
        self.signals
            .set_errors(id.clone(), count as u64, 100)
            .await;
        let lines = vec![line; count];
        self.signals.push_diagnostics(id, &lines).await;
    }

    pub fn orchestrator(&self) -> RemediationOrchestrator {
        RemediationOrchestrator::new(self.signals.clone(), self.plane.clone())
    }

    pub async fn live_revision(&self, resource: &str) -> String {
        use mender::ControlPlane;
        self.plane
            .read(&ResourceId::from(resource), "live")
            .await
            .expect("resource registered")
            .revision
            .to_string()
    }
}

/// Cycle config with no delays.
pub fn cycle_config(resources: &[&str]) -> CycleConfig {
    CycleConfig {
        resources: resources.iter().map(|r| (*r).to_string()).collect(),
        settle_delay_ms: 0,
        batch_delay_ms: 0,
        ..CycleConfig::default()
    }
}
