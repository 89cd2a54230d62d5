//! In-memory control plane.
//!
//! Each resource has an unpublished working copy, an append-only list of
//! published revisions numbered from 1, and named aliases pointing at
//! revisions. Registering a resource publishes revision 1 and points the
//! default alias at it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::domain::models::{
    Mutation, ResourceConfig, ResourceId, ResourceState, RevisionId, Snapshot,
};
use crate::domain::ports::{ApplyResult, ControlPlane, ControlPlaneError};

/// Injectable misbehaviour, set per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    FailSnapshot,
    FailApply,
    FailRestore,
    FailPublish,
    /// Moving an alias to a newer revision fails.
    FailAliasSwitch,
    /// Moving an alias to an older or the same revision fails.
    FailRollback,
    /// `read` fails for every alias.
    FailRead,
    /// `apply` reports success but leaves the working copy untouched.
    IgnoreMutation,
    /// Moving an alias forward reports success but the alias stays put.
    AliasDrift,
    /// `apply` panics, aborting the calling task.
    PanicOnApply,
}

/// One control-plane call, in global call order.
#[derive(Debug, Clone)]
pub struct ControlCall {
    pub seq: u64,
    pub resource_id: ResourceId,
    pub operation: &'static str,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Revision {
    number: u64,
    config: ResourceConfig,
    code_sha256: String,
}

#[derive(Debug, Clone)]
struct ResourceRecord {
    working: ResourceConfig,
    working_code: String,
    builds: u64,
    revisions: Vec<Revision>,
    aliases: HashMap<String, u64>,
    faults: HashSet<Fault>,
    applies: usize,
}

impl ResourceRecord {
    fn revision(&self, number: u64) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.number == number)
    }

    fn state_behind(&self, alias: &str) -> Result<ResourceState, ControlPlaneError> {
        let number = self
            .aliases
            .get(alias)
            .ok_or_else(|| ControlPlaneError::RevisionNotFound(format!("alias '{alias}'")))?;
        let revision = self
            .revision(*number)
            .ok_or_else(|| ControlPlaneError::RevisionNotFound(number.to_string()))?;
        Ok(ResourceState {
            revision: RevisionId::new(revision.number.to_string()),
            config: revision.config,
            code_sha256: revision.code_sha256.clone(),
        })
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

/// In-memory control plane for tests and dry runs.
pub struct InMemoryControlPlane {
    default_alias: String,
    resources: Arc<RwLock<HashMap<ResourceId, ResourceRecord>>>,
    calls: Arc<Mutex<Vec<ControlCall>>>,
    latency: Option<Duration>,
}

impl InMemoryControlPlane {
    pub fn new(default_alias: impl Into<String>) -> Self {
        Self {
            default_alias: default_alias.into(),
            resources: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a resource with `config` published as revision 1.
    pub async fn register(&self, resource_id: ResourceId, config: ResourceConfig) {
        let code = "pkg-0".to_string();
        let record = ResourceRecord {
            working: config,
            working_code: code.clone(),
            builds: 0,
            revisions: vec![Revision {
                number: 1,
                config,
                code_sha256: code,
            }],
            aliases: HashMap::from([(self.default_alias.clone(), 1)]),
            faults: HashSet::new(),
            applies: 0,
        };
        self.resources.write().await.insert(resource_id, record);
    }

    pub async fn inject(&self, resource_id: ResourceId, fault: Fault) {
        if let Some(record) = self.resources.write().await.get_mut(&resource_id) {
            record.faults.insert(fault);
        }
    }

    pub async fn clear_faults(&self, resource_id: &ResourceId) {
        if let Some(record) = self.resources.write().await.get_mut(resource_id) {
            record.faults.clear();
        }
    }

    /// Number of `apply` calls made for a resource.
    pub async fn mutation_count(&self, resource_id: &ResourceId) -> usize {
        self.resources
            .read()
            .await
            .get(resource_id)
            .map_or(0, |r| r.applies)
    }

    pub async fn working_config(&self, resource_id: &ResourceId) -> Option<ResourceConfig> {
        self.resources.read().await.get(resource_id).map(|r| r.working)
    }

    pub async fn revision_count(&self, resource_id: &ResourceId) -> usize {
        self.resources
            .read()
            .await
            .get(resource_id)
            .map_or(0, |r| r.revisions.len())
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_for(&self, resource_id: &ResourceId) -> Vec<ControlCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| &c.resource_id == resource_id)
            .cloned()
            .collect()
    }

    async fn record_call(&self, resource_id: &ResourceId, operation: &'static str) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut calls = self.calls.lock().await;
        let seq = calls.len() as u64;
        calls.push(ControlCall {
            seq,
            resource_id: resource_id.clone(),
            operation,
            at: Utc::now(),
        });
    }
}

fn not_found(resource_id: &ResourceId) -> ControlPlaneError {
    ControlPlaneError::NotFound(resource_id.to_string())
}

fn parse_revision(revision: &RevisionId) -> Result<u64, ControlPlaneError> {
    revision
        .as_str()
        .parse()
        .map_err(|_| ControlPlaneError::RevisionNotFound(revision.to_string()))
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn snapshot(
        &self,
        resource: &ResourceId,
        alias: &str,
    ) -> Result<Snapshot, ControlPlaneError> {
        self.record_call(resource, "snapshot").await;
        let resources = self.resources.read().await;
        let record = resources.get(resource).ok_or_else(|| not_found(resource))?;
        if record.has(Fault::FailSnapshot) {
            return Err(ControlPlaneError::Unavailable("snapshot refused".to_string()));
        }
        Ok(Snapshot::new(resource.clone(), record.state_behind(alias)?))
    }

    async fn apply(
        &self,
        resource: &ResourceId,
        mutation: &Mutation,
    ) -> Result<ApplyResult, ControlPlaneError> {
        self.record_call(resource, "apply").await;
        let mut resources = self.resources.write().await;
        let record = resources.get_mut(resource).ok_or_else(|| not_found(resource))?;
        record.applies += 1;
        if record.has(Fault::PanicOnApply) {
            panic!("injected panic while applying to {resource}");
        }
        if record.has(Fault::FailApply) {
            return Err(ControlPlaneError::Rejected("update rejected".to_string()));
        }
        if record.has(Fault::IgnoreMutation) {
            return Ok(ApplyResult {
                mutation: *mutation,
                detail: None,
            });
        }

        mutation.apply_to(&mut record.working);
        if matches!(mutation, Mutation::RepackageDependencies) {
            record.builds += 1;
            record.working_code = format!("pkg-{}", record.builds);
        }
        Ok(ApplyResult {
            mutation: *mutation,
            detail: Some(format!("working copy updated: {mutation}")),
        })
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<(), ControlPlaneError> {
        let resource = &snapshot.resource_id;
        self.record_call(resource, "restore").await;
        let mut resources = self.resources.write().await;
        let record = resources.get_mut(resource).ok_or_else(|| not_found(resource))?;
        if record.has(Fault::FailRestore) {
            return Err(ControlPlaneError::Unavailable("restore refused".to_string()));
        }
        record.working = snapshot.prior.config;
        record.working_code.clone_from(&snapshot.prior.code_sha256);
        Ok(())
    }

    async fn publish(&self, resource: &ResourceId) -> Result<RevisionId, ControlPlaneError> {
        self.record_call(resource, "publish").await;
        let mut resources = self.resources.write().await;
        let record = resources.get_mut(resource).ok_or_else(|| not_found(resource))?;
        if record.has(Fault::FailPublish) {
            return Err(ControlPlaneError::Unavailable("publish refused".to_string()));
        }
        let number = record.revisions.iter().map(|r| r.number).max().unwrap_or(0) + 1;
        record.revisions.push(Revision {
            number,
            config: record.working,
            code_sha256: record.working_code.clone(),
        });
        Ok(RevisionId::new(number.to_string()))
    }

    async fn set_alias(
        &self,
        resource: &ResourceId,
        alias: &str,
        revision: &RevisionId,
    ) -> Result<(), ControlPlaneError> {
        self.record_call(resource, "set_alias").await;
        let target = parse_revision(revision)?;
        let mut resources = self.resources.write().await;
        let record = resources.get_mut(resource).ok_or_else(|| not_found(resource))?;
        if record.revision(target).is_none() {
            return Err(ControlPlaneError::RevisionNotFound(revision.to_string()));
        }

        let current = record.aliases.get(alias).copied().unwrap_or(0);
        if target > current {
            if record.has(Fault::FailAliasSwitch) {
                return Err(ControlPlaneError::Rejected("alias update refused".to_string()));
            }
            if record.has(Fault::AliasDrift) {
                return Ok(());
            }
        } else if record.has(Fault::FailRollback) {
            return Err(ControlPlaneError::Unavailable("alias rollback refused".to_string()));
        }

        record.aliases.insert(alias.to_string(), target);
        Ok(())
    }

    async fn read(
        &self,
        resource: &ResourceId,
        alias: &str,
    ) -> Result<ResourceState, ControlPlaneError> {
        self.record_call(resource, "read").await;
        let resources = self.resources.read().await;
        let record = resources.get(resource).ok_or_else(|| not_found(resource))?;
        if record.has(Fault::FailRead) {
            return Err(ControlPlaneError::Unavailable("read refused".to_string()));
        }
        record.state_behind(alias)
    }
}
