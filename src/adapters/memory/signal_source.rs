//! Static signal source.
//!
//! Serves canned error windows and diagnostic lines. Stored lines are
//! assumed to be pre-filtered, so the filter's pattern is ignored and only
//! its limit applies.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::models::{DiagnosticSample, ErrorWindow, ResourceId};
use crate::domain::ports::{DiagnosticFilter, SignalError, SignalSource};

#[derive(Default)]
pub struct StaticSignalSource {
    windows: Arc<RwLock<HashMap<ResourceId, ErrorWindow>>>,
    diagnostics: Arc<RwLock<HashMap<ResourceId, Vec<DiagnosticSample>>>>,
    failing_metrics: Arc<RwLock<HashSet<ResourceId>>>,
    failing_diagnostics: Arc<RwLock<HashSet<ResourceId>>>,
}

impl StaticSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_errors(&self, resource_id: ResourceId, error_count: u64, invocations: u64) {
        self.windows.write().await.insert(
            resource_id,
            ErrorWindow {
                error_count,
                invocations,
            },
        );
    }

    /// Append diagnostic lines for a resource.
    pub async fn push_diagnostics(&self, resource_id: ResourceId, lines: &[&str]) {
        let stream = format!("{resource_id}/stream");
        self.diagnostics
            .write()
            .await
            .entry(resource_id)
            .or_default()
            .extend(lines.iter().map(|l| DiagnosticSample::new(*l, stream.clone())));
    }

    pub async fn fail_metrics(&self, resource_id: ResourceId) {
        self.failing_metrics.write().await.insert(resource_id);
    }

    pub async fn fail_diagnostics(&self, resource_id: ResourceId) {
        self.failing_diagnostics.write().await.insert(resource_id);
    }
}

#[async_trait]
impl SignalSource for StaticSignalSource {
    async fn error_window(
        &self,
        resource: &ResourceId,
        _window: Duration,
    ) -> Result<ErrorWindow, SignalError> {
        if self.failing_metrics.read().await.contains(resource) {
            return Err(SignalError::Unavailable(format!(
                "metrics for {resource} unavailable"
            )));
        }
        self.windows
            .read()
            .await
            .get(resource)
            .copied()
            .ok_or_else(|| SignalError::UnknownResource(resource.to_string()))
    }

    async fn diagnostics(
        &self,
        resource: &ResourceId,
        _window: Duration,
        filter: &DiagnosticFilter,
    ) -> Result<Vec<DiagnosticSample>, SignalError> {
        if self.failing_diagnostics.read().await.contains(resource) {
            return Err(SignalError::Unavailable(format!(
                "diagnostics for {resource} unavailable"
            )));
        }
        Ok(self
            .diagnostics
            .read()
            .await
            .get(resource)
            .map(|lines| lines.iter().take(filter.limit).cloned().collect())
            .unwrap_or_default())
    }
}
