use crate::domain::models::{DiagnosticSample, ErrorWindow, ResourceId};
use crate::domain::ports::errors::SignalError;
use async_trait::async_trait;
use std::time::Duration;

/// Filter for diagnostic queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFilter {
    /// Pattern the source uses to select lines (e.g. `ERROR`)
    pub pattern: String,
    /// Maximum lines to return
    pub limit: usize,
}

impl DiagnosticFilter {
    pub fn new(pattern: impl Into<String>, limit: usize) -> Self {
        Self {
            pattern: pattern.into(),
            limit,
        }
    }
}

/// Port for the metric/log retrieval layer
///
/// Pure data provider: implementations must not mutate the resource. The
/// order of returned diagnostics is unspecified beyond "within the window".
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Error and invocation counts over the trailing `window`
    async fn error_window(
        &self,
        resource: &ResourceId,
        window: Duration,
    ) -> Result<ErrorWindow, SignalError>;

    /// Recent diagnostic lines within `window`, at most `filter.limit`
    async fn diagnostics(
        &self,
        resource: &ResourceId,
        window: Duration,
        filter: &DiagnosticFilter,
    ) -> Result<Vec<DiagnosticSample>, SignalError>;
}
