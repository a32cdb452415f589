//! # Cluster access
//!
//! Thin, namespace-scoped capability surface over the cluster API. The
//! poller, validator and config store only ever read and write the cluster
//! through [`ResourceClient`], which keeps them testable against
//! [`mock::MockResourceClient`].
//!
//! ## Resources touched
//!
//! - **Pods**: listed by label, never mutated
//! - **Workloads**: apps/v1 Deployments, or OpenShift DeploymentConfigs
//! - **Services** and **Routes**: read-only existence checks
//! - **ConfigMaps**: created, replaced and deleted by the run
//! - **RoleBindings**: a `view` grant for the application's service account

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{LabelSelector, PodObservation, RedeploymentMarker};

pub mod kube_client;
pub mod mock;

pub use kube_client::KubeResourceClient;
pub use mock::MockResourceClient;

/// Service account the deployed sample application runs as
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Errors from the cluster API
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to load cluster configuration: {0}")]
    Connect(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

/// Which API a workload was found under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    DeploymentConfig,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::DeploymentConfig => "DeploymentConfig",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSummary {
    pub name: String,
    pub kind: WorkloadKind,
    pub annotations: BTreeMap<String, String>,
}

impl WorkloadSummary {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Same matching rule as pods: exact key, value ignoring case
    pub fn carries(&self, marker: &RedeploymentMarker) -> bool {
        self.annotation(&marker.key)
            .map(|value| value.eq_ignore_ascii_case(&marker.value))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    pub name: String,
    /// Externally reachable host; routes that are not admitted yet have none
    pub host: Option<String>,
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Namespace every call is scoped to
    fn namespace(&self) -> &str;

    async fn list_pods(&self, selector: &LabelSelector)
        -> Result<Vec<PodObservation>, ClusterError>;

    async fn get_workload(&self, name: &str) -> Result<Option<WorkloadSummary>, ClusterError>;

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, ClusterError>;

    async fn get_service(&self, name: &str) -> Result<Option<ServiceSummary>, ClusterError>;

    async fn get_route(&self, name: &str) -> Result<Option<RouteSummary>, ClusterError>;

    async fn get_config_map(
        &self,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ClusterError>;

    async fn create_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError>;

    /// Replace the whole data map of an existing config map
    async fn replace_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError>;

    /// Returns false when there was nothing to delete
    async fn delete_config_map(&self, name: &str) -> Result<bool, ClusterError>;

    /// Bind the cluster `view` role to a service account of this namespace
    async fn grant_view_role(&self, service_account: &str) -> Result<(), ClusterError>;
}
