use crate::domain::models::{Mutation, ResourceId, ResourceState, RevisionId, Snapshot};
use crate::domain::ports::errors::ControlPlaneError;
use async_trait::async_trait;

/// Acknowledgement of an applied mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub mutation: Mutation,
    /// Free-form detail from the control plane, for logging
    pub detail: Option<String>,
}

/// Port for the resource control plane
///
/// Every mutation after `snapshot` must be compensable by pointing the alias
/// back at an already-published revision, or by restoring the snapshot's
/// unpublished working configuration.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Capture the state currently served through `alias`
    async fn snapshot(&self, resource: &ResourceId, alias: &str)
        -> Result<Snapshot, ControlPlaneError>;

    /// Apply a mutation to the unpublished working copy
    async fn apply(
        &self,
        resource: &ResourceId,
        mutation: &Mutation,
    ) -> Result<ApplyResult, ControlPlaneError>;

    /// Reset the unpublished working copy to the snapshot
    async fn restore(&self, snapshot: &Snapshot) -> Result<(), ControlPlaneError>;

    /// Publish the working copy as a new immutable revision
    async fn publish(&self, resource: &ResourceId) -> Result<RevisionId, ControlPlaneError>;

    /// Point `alias` at `revision`
    async fn set_alias(
        &self,
        resource: &ResourceId,
        alias: &str,
        revision: &RevisionId,
    ) -> Result<(), ControlPlaneError>;

    /// Read the state currently served through `alias`
    async fn read(&self, resource: &ResourceId, alias: &str)
        -> Result<ResourceState, ControlPlaneError>;
}
