//! [`ResourceClient`] backed by a real cluster through `kube`.
//!
//! Typed APIs cover pods, services, config maps, deployments and role
//! bindings. OpenShift-only kinds (Route, DeploymentConfig) go through
//! `DynamicObject`, so the same client works against plain Kubernetes,
//! where those lookups simply find nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tracing::{debug, info, instrument};

use super::{
    ClusterError, ResourceClient, RouteSummary, ServiceSummary, WorkloadKind, WorkloadSummary,
};
use crate::model::{LabelSelector, PodObservation};

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Cluster role granted to the application's service account
const VIEW_CLUSTER_ROLE: &str = "view";

fn route_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("route.openshift.io", "v1", "Route"),
        "routes",
    )
}

fn deployment_config_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("apps.openshift.io", "v1", "DeploymentConfig"),
        "deploymentconfigs",
    )
}

/// Connection to one namespace of a cluster
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
    namespace: String,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeResourceClient {
    /// Connect using the ambient kubeconfig or in-cluster environment.
    ///
    /// Without an explicit namespace the kubeconfig context's namespace is used.
    #[instrument(skip_all)]
    pub async fn connect(namespace: Option<&str>) -> Result<Self, ClusterError> {
        let mut config = Config::infer()
            .await
            .map_err(|e| ClusterError::Connect(e.to_string()))?;
        config.read_timeout = Some(DEFAULT_API_TIMEOUT);
        let client = Client::try_from(config)?;
        let namespace = namespace
            .map(str::to_string)
            .unwrap_or_else(|| client.default_namespace().to_string());

        debug!("Connected to cluster, namespace '{}'", namespace);
        Ok(Self::new(client, namespace))
    }

    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn dynamic_api(&self, resource: &ApiResource) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, resource)
    }

    async fn get_deployment_config(
        &self,
        name: &str,
    ) -> Result<Option<WorkloadSummary>, ClusterError> {
        let api = self.dynamic_api(&deployment_config_resource());
        let found = api.get_opt(name).await?;
        Ok(found.map(|obj| workload_from_meta(obj.metadata, WorkloadKind::DeploymentConfig)))
    }

    async fn list_deployment_configs(&self) -> Result<Vec<WorkloadSummary>, ClusterError> {
        let api = self.dynamic_api(&deployment_config_resource());
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list
                .items
                .into_iter()
                .map(|obj| workload_from_meta(obj.metadata, WorkloadKind::DeploymentConfig))
                .collect()),
            // Plain Kubernetes: the OpenShift API group does not exist
            Err(kube::Error::Api(ref err)) if err.code == 404 => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// SBIO: Pure conversions from API objects (no I/O)
// ============================================================================

/// Ready when the `Ready` condition reports `True`
pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.type_ == "Ready")
        })
        .map(|condition| condition.status == "True")
        .unwrap_or(false)
}

pub fn observe_pod(pod: &Pod) -> PodObservation {
    PodObservation {
        name: pod.metadata.name.clone().unwrap_or_default(),
        ready: pod_ready(pod),
        phase: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
    }
}

fn workload_from_meta(metadata: ObjectMeta, kind: WorkloadKind) -> WorkloadSummary {
    WorkloadSummary {
        name: metadata.name.unwrap_or_default(),
        kind,
        annotations: metadata.annotations.unwrap_or_default(),
    }
}

/// Host of a route object, from `spec.host`
pub fn route_host(route: &DynamicObject) -> Option<String> {
    route
        .data
        .get("spec")
        .and_then(|spec| spec.get("host"))
        .and_then(|host| host.as_str())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

fn view_binding(namespace: &str, service_account: &str) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", VIEW_CLUSTER_ROLE, service_account)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: VIEW_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

// ============================================================================
// SBIO: I/O implementation (real cluster)
// ============================================================================

#[async_trait]
impl ResourceClient for KubeResourceClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_pods(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<PodObservation>, ClusterError> {
        let pods: Api<Pod> = self.api();
        let params = ListParams::default().labels(&selector.to_string());
        let list = pods.list(&params).await?;
        Ok(list.items.iter().map(observe_pod).collect())
    }

    async fn get_workload(&self, name: &str) -> Result<Option<WorkloadSummary>, ClusterError> {
        let deployments: Api<Deployment> = self.api();
        if let Some(deployment) = deployments.get_opt(name).await? {
            return Ok(Some(workload_from_meta(
                deployment.metadata,
                WorkloadKind::Deployment,
            )));
        }
        self.get_deployment_config(name).await
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, ClusterError> {
        let deployments: Api<Deployment> = self.api();
        let mut workloads: Vec<WorkloadSummary> = deployments
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .map(|d| workload_from_meta(d.metadata, WorkloadKind::Deployment))
            .collect();
        workloads.extend(self.list_deployment_configs().await?);
        Ok(workloads)
    }

    async fn get_service(&self, name: &str) -> Result<Option<ServiceSummary>, ClusterError> {
        let services: Api<Service> = self.api();
        Ok(services.get_opt(name).await?.map(|svc| ServiceSummary {
            name: svc.metadata.name.unwrap_or_else(|| name.to_string()),
        }))
    }

    async fn get_route(&self, name: &str) -> Result<Option<RouteSummary>, ClusterError> {
        let routes = self.dynamic_api(&route_resource());
        Ok(routes.get_opt(name).await?.map(|route| RouteSummary {
            name: name.to_string(),
            host: route_host(&route),
        }))
    }

    async fn get_config_map(
        &self,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ClusterError> {
        let config_maps: Api<ConfigMap> = self.api();
        Ok(config_maps
            .get_opt(name)
            .await?
            .map(|cm| cm.data.unwrap_or_default()))
    }

    async fn create_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        let config_maps: Api<ConfigMap> = self.api();
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(data.clone()),
            ..Default::default()
        };
        config_maps
            .create(&PostParams::default(), &config_map)
            .await?;
        info!("Created config map {}/{}", self.namespace, name);
        Ok(())
    }

    async fn replace_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        let config_maps: Api<ConfigMap> = self.api();
        let mut existing = config_maps
            .get_opt(name)
            .await?
            .ok_or_else(|| ClusterError::NotFound {
                kind: "ConfigMap",
                name: name.to_string(),
            })?;
        existing.data = Some(data.clone());
        config_maps
            .replace(name, &PostParams::default(), &existing)
            .await?;
        info!("Replaced config map {}/{}", self.namespace, name);
        Ok(())
    }

    async fn delete_config_map(&self, name: &str) -> Result<bool, ClusterError> {
        let config_maps: Api<ConfigMap> = self.api();
        match config_maps.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted config map {}/{}", self.namespace, name);
                Ok(true)
            }
            Err(kube::Error::Api(ref err)) if err.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn grant_view_role(&self, service_account: &str) -> Result<(), ClusterError> {
        let bindings: Api<RoleBinding> = self.api();
        let binding = view_binding(&self.namespace, service_account);
        match bindings.create(&PostParams::default(), &binding).await {
            Ok(_) => {
                info!(
                    "Granted '{}' role to service account {}/{}",
                    VIEW_CLUSTER_ROLE, self.namespace, service_account
                );
                Ok(())
            }
            Err(kube::Error::Api(ref err)) if err.code == 409 => {
                debug!(
                    "Service account {}/{} already has the '{}' role",
                    self.namespace, service_account, VIEW_CLUSTER_ROLE
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
