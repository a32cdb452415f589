//! In-memory [`ResourceClient`] for tests and offline runs.
//!
//! Pod listings are scripted: each `list_pods` call consumes the next
//! listing, and the last listing repeats once the script is exhausted.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    ClusterError, ResourceClient, RouteSummary, ServiceSummary, WorkloadKind, WorkloadSummary,
};
use crate::model::{LabelSelector, PodObservation};

#[derive(Default)]
struct MockState {
    pod_script: Vec<Vec<PodObservation>>,
    workloads: HashMap<String, WorkloadSummary>,
    services: HashMap<String, ServiceSummary>,
    routes: HashMap<String, RouteSummary>,
    config_maps: BTreeMap<String, BTreeMap<String, String>>,
    view_grants: Vec<String>,
    selectors: Vec<LabelSelector>,
    deleted_config_maps: Vec<String>,
}

pub struct MockResourceClient {
    namespace: String,
    state: Mutex<MockState>,
    list_calls: AtomicUsize,
    config_writes: AtomicUsize,
}

impl MockResourceClient {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            state: Mutex::new(MockState::default()),
            list_calls: AtomicUsize::new(0),
            config_writes: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pod script; listing N returns `script[N]`
    pub fn script_pods(&self, script: Vec<Vec<PodObservation>>) {
        self.state().pod_script = script;
        self.list_calls.store(0, Ordering::SeqCst);
    }

    /// Every following listing returns `pods`
    pub fn set_pods(&self, pods: Vec<PodObservation>) {
        self.script_pods(vec![pods]);
    }

    /// Register a workload, service and route named after `app`, the way a
    /// successful deploy leaves them.
    pub fn deploy_app(&self, app: &str, host: &str) {
        self.add_workload(app, WorkloadKind::DeploymentConfig, BTreeMap::new());
        self.add_service(app);
        self.add_route(app, Some(host));
    }

    pub fn add_workload(
        &self,
        name: &str,
        kind: WorkloadKind,
        annotations: BTreeMap<String, String>,
    ) {
        self.state().workloads.insert(
            name.to_string(),
            WorkloadSummary {
                name: name.to_string(),
                kind,
                annotations,
            },
        );
    }

    pub fn annotate_workload(&self, name: &str, key: &str, value: &str) {
        if let Some(workload) = self.state().workloads.get_mut(name) {
            workload
                .annotations
                .insert(key.to_string(), value.to_string());
        }
    }

    pub fn add_service(&self, name: &str) {
        self.state().services.insert(
            name.to_string(),
            ServiceSummary {
                name: name.to_string(),
            },
        );
    }

    pub fn add_route(&self, name: &str, host: Option<&str>) {
        self.state().routes.insert(
            name.to_string(),
            RouteSummary {
                name: name.to_string(),
                host: host.map(str::to_string),
            },
        );
    }

    pub fn remove_workload(&self, name: &str) {
        self.state().workloads.remove(name);
    }

    pub fn remove_service(&self, name: &str) {
        self.state().services.remove(name);
    }

    pub fn remove_route(&self, name: &str) {
        self.state().routes.remove(name);
    }

    pub fn config_map(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.state().config_maps.get(name).cloned()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of create/replace calls issued against config maps
    pub fn config_writes(&self) -> usize {
        self.config_writes.load(Ordering::SeqCst)
    }

    pub fn view_grants(&self) -> Vec<String> {
        self.state().view_grants.clone()
    }

    pub fn selectors(&self) -> Vec<LabelSelector> {
        self.state().selectors.clone()
    }

    pub fn deleted_config_maps(&self) -> Vec<String> {
        self.state().deleted_config_maps.clone()
    }
}

#[async_trait]
impl ResourceClient for MockResourceClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_pods(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<PodObservation>, ClusterError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.selectors.push(selector.clone());
        let listing = state
            .pod_script
            .get(call)
            .or_else(|| state.pod_script.last())
            .cloned()
            .unwrap_or_default();
        Ok(listing)
    }

    async fn get_workload(&self, name: &str) -> Result<Option<WorkloadSummary>, ClusterError> {
        Ok(self.state().workloads.get(name).cloned())
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, ClusterError> {
        Ok(self.state().workloads.values().cloned().collect())
    }

    async fn get_service(&self, name: &str) -> Result<Option<ServiceSummary>, ClusterError> {
        Ok(self.state().services.get(name).cloned())
    }

    async fn get_route(&self, name: &str) -> Result<Option<RouteSummary>, ClusterError> {
        Ok(self.state().routes.get(name).cloned())
    }

    async fn get_config_map(
        &self,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ClusterError> {
        Ok(self.config_map(name))
    }

    async fn create_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        self.config_writes.fetch_add(1, Ordering::SeqCst);
        self.state()
            .config_maps
            .insert(name.to_string(), data.clone());
        Ok(())
    }

    async fn replace_config_map(
        &self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        self.config_writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        match state.config_maps.get_mut(name) {
            Some(existing) => {
                *existing = data.clone();
                Ok(())
            }
            None => Err(ClusterError::NotFound {
                kind: "ConfigMap",
                name: name.to_string(),
            }),
        }
    }

    async fn delete_config_map(&self, name: &str) -> Result<bool, ClusterError> {
        let mut state = self.state();
        let existed = state.config_maps.remove(name).is_some();
        if existed {
            state.deleted_config_maps.push(name.to_string());
        }
        Ok(existed)
    }

    async fn grant_view_role(&self, service_account: &str) -> Result<(), ClusterError> {
        self.state().view_grants.push(service_account.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pod_script_repeats_last_listing() {
        let mock = MockResourceClient::new("demo");
        mock.script_pods(vec![
            vec![],
            vec![PodObservation::new("web-1", true, "Running")],
        ]);
        let selector = LabelSelector::new("app", "web");

        assert!(mock.list_pods(&selector).await.unwrap().is_empty());
        assert_eq!(mock.list_pods(&selector).await.unwrap().len(), 1);
        assert_eq!(mock.list_pods(&selector).await.unwrap().len(), 1);
        assert_eq!(mock.list_calls(), 3);
        assert_eq!(mock.selectors()[0].to_string(), "app=web");
    }

    #[tokio::test]
    async fn test_replace_missing_config_map_fails() {
        let mock = MockResourceClient::new("demo");
        let result = mock.replace_config_map("absent", &BTreeMap::new()).await;
        assert!(matches!(result, Err(ClusterError::NotFound { .. })));
    }
}
