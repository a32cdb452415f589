//! End-to-end scenario runs against an in-memory cluster
//!
//! The "deployed application" is a real axum server on localhost; the
//! scripted build plays the part of the deploy plugin by registering pods,
//! workload, service and route in the mock cluster and by feeding the
//! config entry's message to the server.

use std::collections::HashMap;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::time::sleep;

use deployprobe::cluster::MockResourceClient;
use deployprobe::config::ScenarioConfig;
use deployprobe::http::ReqwestHttpClient;
use deployprobe::model::PodObservation;
use deployprobe::project::{BuildError, BuildTrigger, SourceControl, SourceError, WorkingCopy};
use deployprobe::{FailureKind, ScenarioReport, ScenarioRunner, ScenarioState};

const CONFIG_NAME: &str = "app-config";
const DEFAULT_GREETING: &str = "Hello, %s!";

fn pom(artifact_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>io.openshift.booster</groupId>
  <artifactId>{}</artifactId>
  <version>1.0.0</version>
  <dependencies>
    <dependency>
      <groupId>io.vertx</groupId>
      <artifactId>vertx-web</artifactId>
    </dependency>
  </dependencies>
  <profiles>
    <profile>
      <id>openshift</id>
      <build>
        <plugins>
          <plugin>
            <groupId>io.fabric8</groupId>
            <artifactId>fabric8-maven-plugin</artifactId>
            <version>3.5.30</version>
          </plugin>
        </plugins>
      </build>
    </profile>
  </profiles>
</project>
"#,
        artifact_id
    )
}

/// Find an available port for testing
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to address")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

// ============================================================================
// Deployed application
// ============================================================================

type Greeting = Arc<Mutex<String>>;

async fn greeting(
    State(message): State<Greeting>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let name = params
        .get("name")
        .cloned()
        .unwrap_or_else(|| "World".to_string());
    let template = message.lock().unwrap().clone();
    Json(json!({"id": 1, "content": template.replace("%s", &name)}))
}

/// Start the greeting application; returns its host and message handle
async fn start_application() -> (String, Greeting) {
    let message: Greeting = Arc::new(Mutex::new(DEFAULT_GREETING.to_string()));
    let app = Router::new()
        .route("/api/greeting", get(greeting))
        .with_state(message.clone());

    let port = find_available_port();
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .expect("Failed to bind application");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    sleep(Duration::from_millis(50)).await;
    (format!("127.0.0.1:{}", port), message)
}

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Writes the fixture descriptor into a fresh temporary checkout
struct FixtureSource {
    descriptor: String,
    artifact_id: String,
    checkouts: Mutex<Vec<PathBuf>>,
}

impl FixtureSource {
    fn new(descriptor: &str, artifact_id: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            artifact_id: artifact_id.to_string(),
            checkouts: Mutex::new(Vec::new()),
        }
    }

    fn checkouts(&self) -> Vec<PathBuf> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FixtureSource {
    async fn checkout(&self, _url: &str) -> Result<WorkingCopy, SourceError> {
        let copy = WorkingCopy::temporary(tempfile::tempdir()?);
        let path = copy.join(&self.descriptor);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !self.artifact_id.is_empty() {
            std::fs::write(&path, pom(&self.artifact_id))?;
        }
        self.checkouts.lock().unwrap().push(copy.path().to_path_buf());
        Ok(copy)
    }
}

#[derive(Default)]
struct BuildBehaviour {
    fail: bool,
    no_ready_pods: bool,
    without_route: bool,
    keep_pod_name: bool,
    ignore_config: bool,
}

/// Deploys the application into the mock cluster the way the plugin would
struct ScriptedBuild {
    client: Arc<MockResourceClient>,
    message: Greeting,
    host: String,
    app: String,
    behaviour: BuildBehaviour,
    builds: AtomicUsize,
    descriptors: Mutex<Vec<String>>,
}

impl ScriptedBuild {
    fn new(client: Arc<MockResourceClient>, message: Greeting, host: &str, app: &str) -> Self {
        Self {
            client,
            message,
            host: host.to_string(),
            app: app.to_string(),
            behaviour: BuildBehaviour::default(),
            builds: AtomicUsize::new(0),
            descriptors: Mutex::new(Vec::new()),
        }
    }

    fn with_behaviour(mut self, behaviour: BuildBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn descriptors(&self) -> Vec<String> {
        self.descriptors.lock().unwrap().clone()
    }
}

/// Marker written into the plugin's pod annotations, if any
fn pod_marker(descriptor: &str) -> Option<(String, String)> {
    let open = "<pod><property><name>";
    let start = descriptor.find(open)? + open.len();
    let (key, rest) = descriptor[start..].split_once("</name><value>")?;
    let (value, _) = rest.split_once("</value>")?;
    Some((key.to_string(), value.to_string()))
}

#[async_trait]
impl BuildTrigger for ScriptedBuild {
    async fn run_build(
        &self,
        _project_dir: &Path,
        descriptor: &Path,
        _goals: &str,
        _profile: &str,
    ) -> Result<(), BuildError> {
        let build = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        let content = std::fs::read_to_string(descriptor)
            .map_err(|e| BuildError::Spawn(e.to_string()))?;
        self.descriptors.lock().unwrap().push(content.clone());

        if self.behaviour.fail {
            return Err(BuildError::Failed {
                status: Some(1),
                output_tail: "[ERROR] BUILD FAILURE".to_string(),
            });
        }

        if !self.behaviour.ignore_config {
            if let Some(data) = self.client.config_map(CONFIG_NAME) {
                if let Some(properties) = data.get("application.properties") {
                    let message = properties.trim_start_matches("greeting.message: ");
                    *self.message.lock().unwrap() = message.to_string();
                }
            }
        }

        let suffix = if self.behaviour.keep_pod_name { 1 } else { build };
        let mut new_pod = PodObservation::new(
            &format!("{}-{}-pod", self.app, suffix),
            !self.behaviour.no_ready_pods,
            "Running",
        );
        let marker = pod_marker(&content);
        if let Some((key, value)) = &marker {
            new_pod = new_pod.with_annotation(key, value);
        }

        // Pods of the previous rollout are still around and ready
        let mut pods = Vec::new();
        if build > 1 && !self.behaviour.keep_pod_name {
            pods.push(PodObservation::new(
                &format!("{}-{}-pod", self.app, build - 1),
                true,
                "Running",
            ));
        }
        pods.push(new_pod);
        self.client.set_pods(pods);

        self.client.deploy_app(&self.app, &self.host);
        if let Some((key, value)) = &marker {
            self.client.annotate_workload(&self.app, key, value);
        }
        if self.behaviour.without_route {
            self.client.remove_route(&self.app);
        }
        Ok(())
    }
}

struct Harness {
    client: Arc<MockResourceClient>,
    source: Arc<FixtureSource>,
    build: Arc<ScriptedBuild>,
    runner: ScenarioRunner,
}

async fn harness(descriptor: &str, app: &str, behaviour: BuildBehaviour) -> Harness {
    let (host, message) = start_application().await;
    let client = Arc::new(MockResourceClient::new("probe"));
    let source = Arc::new(FixtureSource::new(descriptor, app));
    let build = Arc::new(
        ScriptedBuild::new(client.clone(), message, &host, app).with_behaviour(behaviour),
    );
    let runner = ScenarioRunner::new(
        source.clone(),
        build.clone(),
        client.clone(),
        Arc::new(ReqwestHttpClient::new().unwrap()),
    );
    Harness {
        client,
        source,
        build,
        runner,
    }
}

impl Harness {
    async fn run(&self, yaml: &str) -> ScenarioReport {
        let scenario = ScenarioConfig::from_yaml(yaml).unwrap();
        self.runner.run(&scenario).await
    }

    fn assert_torn_down(&self) {
        assert!(self.client.config_map(CONFIG_NAME).is_none());
        for checkout in self.source.checkouts() {
            assert!(!checkout.exists(), "{} not removed", checkout.display());
        }
    }
}

const FAST: &str = r#"
wait:
  attempts: 5
  interval_secs: 0
settle_secs: 0
"#;

fn configmap_deploy() -> String {
    format!(
        r#"
name: configmap-deploy
repository: https://github.com/snowdrop/spring-boot-configmap-booster.git
build:
  descriptor: greeting-service/pom.xml
  goals: fabric8:deploy -DskipTests
plugin:
  version: 9.9.9
grant_view_role: true
config_entry:
  name: app-config
  data:
    application.properties: "greeting.message: Hello World from a ConfigMap!"
checks:
  - expected: Hello World from a ConfigMap!
{}"#,
        FAST
    )
}

fn configmap_redeploy() -> String {
    format!(
        r#"{}redeploy:
  add_dependency:
    group_id: org.apache.commons
    artifact_id: commons-lang3
    version: "3.5"
  marker:
    key: configmap-testKey
  config_data:
    application.properties: "greeting.message: Bonjour World from a ConfigMap!"
  checks:
    - expected: Bonjour World from a ConfigMap!
"#,
        configmap_deploy()
    )
}

fn http_deploy() -> String {
    format!(
        r#"
name: http-deploy
repository: https://github.com/openshiftio-vertx-boosters/vertx-http-booster.git
plugin:
  version: 9.9.9
checks:
  - expected: Hello, World!
  - expected: Hello, vertx!
    query:
      name: vertx
{}"#,
        FAST
    )
}

fn http_redeploy() -> String {
    format!(
        r#"{}redeploy:
  add_dependency:
    group_id: org.apache.commons
    artifact_id: commons-lang3
    version: "3.5"
  marker:
    key: vertx-testKey
    value: vertx-testValue
  checks:
    - expected: Hello, World!
"#,
        http_deploy()
    )
}

// ============================================================================
// Successful scenarios
// ============================================================================

#[tokio::test]
async fn test_configmap_deploy() {
    let h = harness("greeting-service/pom.xml", "greeting-service", BuildBehaviour::default()).await;
    let report = h.run(&configmap_deploy()).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.state, ScenarioState::Deployed);
    assert_eq!(report.namespace.as_deref(), Some("probe"));
    assert_eq!(report.identity.as_deref(), Some("greeting-service"));
    assert_eq!(report.pod("deploy"), Some("greeting-service-1-pod"));
    assert_eq!(h.client.view_grants(), vec!["default"]);
    assert_eq!(h.build.builds(), 1);

    // Plugin pinned before the build ran
    let descriptors = h.build.descriptors();
    assert!(descriptors[0].contains("<version>9.9.9</version>"));

    // Config entry removed and checkout deleted after the run
    assert_eq!(h.client.deleted_config_maps(), vec![CONFIG_NAME]);
    h.assert_torn_down();
}

#[tokio::test]
async fn test_configmap_redeploy_picks_new_pod() {
    let h = harness("greeting-service/pom.xml", "greeting-service", BuildBehaviour::default()).await;
    let report = h.run(&configmap_redeploy()).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.state, ScenarioState::Validated);
    assert_eq!(report.pod("deploy"), Some("greeting-service-1-pod"));
    assert_eq!(report.pod("redeploy"), Some("greeting-service-2-pod"));
    assert_eq!(h.build.builds(), 2);
    // Created once, replaced once
    assert_eq!(h.client.config_writes(), 2);

    let redeployed = &h.build.descriptors()[1];
    assert!(redeployed.contains("<artifactId>commons-lang3</artifactId>"));
    let (key, value) = pod_marker(redeployed).unwrap();
    assert_eq!(key, "configmap-testKey");
    assert!(!value.is_empty());

    h.assert_torn_down();
}

#[tokio::test]
async fn test_http_deploy_with_query() {
    let h = harness("pom.xml", "vertx-http", BuildBehaviour::default()).await;
    let report = h.run(&http_deploy()).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.state, ScenarioState::Deployed);
    assert!(h.client.view_grants().is_empty());
    // Pinned inside the openshift profile, the only place declaring the plugin
    let descriptor = &h.build.descriptors()[0];
    assert!(descriptor.contains("<version>9.9.9</version>"));
    assert!(!descriptor.contains("<version>3.5.30</version>"));
    h.assert_torn_down();
}

#[tokio::test]
async fn test_plugin_version_read_from_reference_descriptor() {
    let reference = tempfile::tempdir().unwrap();
    let reference_pom = reference.path().join("pom.xml");
    std::fs::write(
        &reference_pom,
        r#"<project>
  <groupId>io.fabric8</groupId>
  <artifactId>fabric8-maven-plugin-parent</artifactId>
  <version>3.5-SNAPSHOT</version>
</project>
"#,
    )
    .unwrap();

    let h = harness("pom.xml", "vertx-http", BuildBehaviour::default()).await;
    let yaml = http_deploy().replace(
        "  version: 9.9.9",
        &format!("  version_from: {}", reference_pom.display()),
    );
    let report = h.run(&yaml).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert!(h.build.descriptors()[0].contains("<version>3.5-SNAPSHOT</version>"));
}

#[tokio::test]
async fn test_missing_plugin_version_fails_before_checkout() {
    let h = harness("pom.xml", "vertx-http", BuildBehaviour::default()).await;
    let yaml = http_deploy().replace("plugin:\n  version: 9.9.9\n", "");
    let report = h.run(&yaml).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Setup));
    assert!(report
        .failure
        .as_ref()
        .unwrap()
        .message
        .contains("no plugin version under test"));
    assert!(h.source.checkouts().is_empty());
    assert_eq!(h.build.builds(), 0);
}

#[tokio::test]
async fn test_http_redeploy_with_fixed_marker() {
    let h = harness("pom.xml", "vertx-http", BuildBehaviour::default()).await;
    let report = h.run(&http_redeploy()).await;

    assert!(report.succeeded(), "{:?}", report.failure);
    assert_eq!(report.state, ScenarioState::Validated);
    assert_eq!(
        pod_marker(&h.build.descriptors()[1]),
        Some(("vertx-testKey".to_string(), "vertx-testValue".to_string()))
    );
    assert_ne!(report.pod("deploy"), report.pod("redeploy"));
    assert!(report.steps.iter().any(|step| step.step == "wait-redeploy"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_build_failure_still_tears_down() {
    let h = harness(
        "greeting-service/pom.xml",
        "greeting-service",
        BuildBehaviour {
            fail: true,
            ..Default::default()
        },
    )
    .await;
    let report = h.run(&configmap_deploy()).await;

    assert_eq!(report.state, ScenarioState::Failed);
    assert_eq!(report.failure_kind(), Some(FailureKind::Build));
    assert!(report.failure.as_ref().unwrap().message.contains("BUILD FAILURE"));
    assert_eq!(h.client.deleted_config_maps(), vec![CONFIG_NAME]);
    h.assert_torn_down();
}

#[tokio::test]
async fn test_no_ready_pod_is_timeout() {
    let h = harness(
        "pom.xml",
        "vertx-http",
        BuildBehaviour {
            no_ready_pods: true,
            ..Default::default()
        },
    )
    .await;
    let report = h.run(&http_deploy()).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Timeout));
    let message = &report.failure.as_ref().unwrap().message;
    assert!(message.contains("vertx-http"));
    assert!(message.contains("5 attempts"));
    assert_eq!(h.client.list_calls(), 5);
    h.assert_torn_down();
}

#[tokio::test]
async fn test_missing_route_is_named() {
    let h = harness(
        "pom.xml",
        "vertx-http",
        BuildBehaviour {
            without_route: true,
            ..Default::default()
        },
    )
    .await;
    let report = h.run(&http_deploy()).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Assertion));
    assert!(report
        .failure
        .as_ref()
        .unwrap()
        .message
        .contains("Route 'vertx-http' not found"));
}

#[tokio::test]
async fn test_stale_config_is_content_mismatch() {
    let h = harness(
        "greeting-service/pom.xml",
        "greeting-service",
        BuildBehaviour {
            ignore_config: true,
            ..Default::default()
        },
    )
    .await;
    let report = h.run(&configmap_deploy()).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Assertion));
    let message = &report.failure.as_ref().unwrap().message;
    assert!(message.contains("expected 'Hello World from a ConfigMap!'"));
    assert!(message.contains("got 'Hello, World!'"));
    h.assert_torn_down();
}

#[tokio::test]
async fn test_reused_pod_name_is_stale() {
    let h = harness(
        "pom.xml",
        "vertx-http",
        BuildBehaviour {
            keep_pod_name: true,
            ..Default::default()
        },
    )
    .await;
    let report = h.run(&http_redeploy()).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Assertion));
    assert!(report.failure.as_ref().unwrap().message.contains("vertx-http-1-pod"));
    assert_eq!(report.state, ScenarioState::Failed);
}

#[tokio::test]
async fn test_setup_failure_touches_nothing() {
    // Checkout without a descriptor
    let h = harness("pom.xml", "", BuildBehaviour::default()).await;
    let report = h.run(&configmap_deploy()).await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Setup));
    assert_eq!(report.state, ScenarioState::Failed);
    assert!(report.identity.is_none());
    assert_eq!(h.build.builds(), 0);
    assert_eq!(h.client.config_writes(), 0);
    assert!(h.client.view_grants().is_empty());
    h.assert_torn_down();
}
