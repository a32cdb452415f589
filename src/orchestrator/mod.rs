//! Scenario runner: deploy, validate, optionally mutate and redeploy, then
//! clean up whatever the run created.
//!
//! ```text
//! Uninitialized -> Deployed -> Mutated -> Redeployed -> Validated
//!        \____________\___________\___________\____________> Failed
//! ```
//!
//! A scenario without a redeploy section stops in `Deployed`. Teardown runs
//! after every run, whatever state it ended in.

pub mod report;

pub use report::{FailureReport, ObservedPod, ScenarioReport, ScenarioState, StepReport};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cluster::{ResourceClient, DEFAULT_SERVICE_ACCOUNT};
use crate::config::{ScenarioConfig, ScenarioConfigError};
use crate::error::ScenarioError;
use crate::http::HttpClient;
use crate::model::{ApplicationIdentity, ConfigEntry, RedeploymentMarker};
use crate::poller::{ReadinessPoller, WaitOutcome};
use crate::project::descriptor::plugin_version_from;
use crate::project::{BuildTrigger, Descriptor, SourceControl, WorkingCopy};
use crate::session::Session;
use crate::store::{ConfigDataStore, StoreAction};
use crate::validator::{ContentCheck, DeploymentValidator, ValidationError};

/// Mutable bookkeeping of one run; everything teardown needs lives here
struct ScenarioRun {
    report: ScenarioReport,
    working_copy: Option<WorkingCopy>,
    config_entries: Vec<String>,
}

impl ScenarioRun {
    fn new(scenario: &ScenarioConfig) -> Self {
        Self {
            report: ScenarioReport::new(&scenario.name),
            working_copy: None,
            config_entries: Vec::new(),
        }
    }

    fn transition(&mut self, to: ScenarioState) {
        info!(
            "Scenario '{}': {} -> {}",
            self.report.scenario, self.report.state, to
        );
        self.report.state = to;
    }

    fn step_done(&mut self, step: &str, started: Instant) {
        let elapsed = started.elapsed();
        debug!("Step '{}' took {:?}", step, elapsed);
        self.report.record_step(step, elapsed);
    }

    fn track_config_entry(&mut self, name: &str) {
        if !self.config_entries.iter().any(|tracked| tracked == name) {
            self.config_entries.push(name.to_string());
        }
    }
}

/// Checked-out project, ready to deploy
struct Prepared {
    session: Session,
    project_dir: PathBuf,
    descriptor: Descriptor,
    plugin_key: String,
}

pub struct ScenarioRunner {
    source: Arc<dyn SourceControl>,
    build: Arc<dyn BuildTrigger>,
    client: Arc<dyn ResourceClient>,
    http: Arc<dyn HttpClient>,
    validator: DeploymentValidator,
}

impl ScenarioRunner {
    pub fn new(
        source: Arc<dyn SourceControl>,
        build: Arc<dyn BuildTrigger>,
        client: Arc<dyn ResourceClient>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            source,
            build,
            client,
            http,
            validator: DeploymentValidator::new(),
        }
    }

    /// Run a scenario to completion. Failures end up in the report, never
    /// as a panic, and teardown has run by the time this returns.
    pub async fn run(&self, scenario: &ScenarioConfig) -> ScenarioReport {
        let mut run = ScenarioRun::new(scenario);
        info!("Starting scenario '{}'", scenario.name);

        let result = self.execute(scenario, &mut run).await;
        if let Err(e) = &result {
            error!("Scenario '{}' failed ({}): {}", scenario.name, e.kind(), e);
            run.transition(ScenarioState::Failed);
            run.report.failure = Some(FailureReport::from(e));
        }

        self.teardown(&mut run).await;

        let mut report = run.report;
        report.finished_at = chrono::Utc::now();
        if report.succeeded() {
            info!("Scenario '{}' passed in state {}", report.scenario, report.state);
        }
        report
    }

    async fn execute(
        &self,
        scenario: &ScenarioConfig,
        run: &mut ScenarioRun,
    ) -> Result<(), ScenarioError> {
        let Prepared {
            session,
            project_dir,
            mut descriptor,
            plugin_key,
        } = self.prepare(scenario, run).await?;
        let poller = ReadinessPoller::new(scenario.wait.settings());
        let store = ConfigDataStore::new(session.client());

        // Uninitialized -> Deployed
        if scenario.grant_view_role {
            session.client().grant_view_role(DEFAULT_SERVICE_ACCOUNT).await?;
        }
        if let Some(entry) = &scenario.config_entry {
            self.apply_config_entry(&store, entry, run).await?;
        }
        self.deploy(scenario, &project_dir, descriptor.path(), run).await?;
        let deployed = self.await_ready(&poller, &session, None, "deploy", run).await?;
        self.settle(scenario.settle()).await;
        self.validate(&session, &scenario.checks, run).await?;
        run.transition(ScenarioState::Deployed);

        let redeploy = match &scenario.redeploy {
            Some(redeploy) => redeploy,
            None => return Ok(()),
        };

        // Deployed -> Mutated
        let marker = redeploy
            .marker
            .as_ref()
            .map(|marker| marker.resolve())
            .transpose()?;
        if let Some(dependency) = &redeploy.add_dependency {
            descriptor.add_dependency(dependency);
        }
        if let Some(marker) = &marker {
            descriptor.set_plugin_annotations(&redeploy.annotation_profile, &plugin_key, marker)?;
        }
        descriptor.save()?;
        if let (Some(data), Some(entry)) = (&redeploy.config_data, &scenario.config_entry) {
            let updated = ConfigEntry {
                name: entry.name.clone(),
                data: data.clone(),
            };
            self.apply_config_entry(&store, &updated, run).await?;
        }
        run.transition(ScenarioState::Mutated);

        // Mutated -> Redeployed
        self.deploy(scenario, &project_dir, descriptor.path(), run).await?;
        run.transition(ScenarioState::Redeployed);

        // Redeployed -> Validated
        let redeployed = self
            .await_ready(&poller, &session, marker.as_ref(), "redeploy", run)
            .await?;
        if marker.is_some() && redeployed.pod == deployed.pod {
            return Err(ValidationError::StalePod(redeployed.pod).into());
        }
        self.settle(scenario.settle()).await;
        self.validate(&session, &redeploy.checks, run).await?;
        if let Some(marker) = &marker {
            self.validator.check_workload_marker(&session, marker).await?;
        }
        run.transition(ScenarioState::Validated);
        Ok(())
    }

    /// Resolve the plugin version under test, checkout, pin it and derive the
    /// application identity. Nothing in the cluster is touched yet.
    async fn prepare(
        &self,
        scenario: &ScenarioConfig,
        run: &mut ScenarioRun,
    ) -> Result<Prepared, ScenarioError> {
        let plugin = scenario.plugin.as_ref().ok_or_else(|| {
            ScenarioConfigError::Invalid(
                "no plugin version under test: set plugin.version, plugin.version_from \
                 or --plugin-version"
                    .to_string(),
            )
        })?;
        let version = match (&plugin.version, &plugin.version_from) {
            (Some(version), _) => version.clone(),
            (None, Some(reference)) => plugin_version_from(reference)?,
            (None, None) => {
                return Err(ScenarioConfigError::Invalid(
                    "plugin needs either version or version_from".to_string(),
                )
                .into())
            }
        };
        info!("Plugin under test: {} {}", plugin.key, version);

        let started = Instant::now();
        let copy = self.source.checkout(&scenario.repository).await?;
        let project_dir = copy.path().to_path_buf();
        let descriptor_path = copy.join(&scenario.build.descriptor);
        run.working_copy = Some(copy);
        run.step_done("checkout", started);

        let mut descriptor = Descriptor::open(&descriptor_path)?;
        let model = descriptor.model()?;
        let identity = ApplicationIdentity::new(model.artifact_id)?;

        descriptor.pin_plugin_version(&plugin.key, &version)?;
        descriptor.save()?;

        let session = Session::new(identity, self.client.clone(), self.http.clone())?;
        run.report.namespace = Some(session.namespace().to_string());
        run.report.identity = Some(session.identity().to_string());
        info!(
            "Application '{}' in namespace '{}'",
            session.identity(),
            session.namespace()
        );

        Ok(Prepared {
            session,
            project_dir,
            descriptor,
            plugin_key: plugin.key.clone(),
        })
    }

    async fn apply_config_entry(
        &self,
        store: &ConfigDataStore<'_>,
        entry: &ConfigEntry,
        run: &mut ScenarioRun,
    ) -> Result<(), ScenarioError> {
        let action = store.create_or_replace(entry).await?;
        if action == StoreAction::Replaced {
            debug!("Config entry {} existed before this step", entry.name);
        }
        run.track_config_entry(&entry.name);
        Ok(())
    }

    async fn deploy(
        &self,
        scenario: &ScenarioConfig,
        project_dir: &Path,
        descriptor: &Path,
        run: &mut ScenarioRun,
    ) -> Result<(), ScenarioError> {
        let started = Instant::now();
        self.build
            .run_build(
                project_dir,
                descriptor,
                &scenario.build.goals,
                &scenario.build.profile,
            )
            .await?;
        run.step_done("build", started);
        Ok(())
    }

    async fn await_ready(
        &self,
        poller: &ReadinessPoller,
        session: &Session,
        marker: Option<&RedeploymentMarker>,
        phase: &str,
        run: &mut ScenarioRun,
    ) -> Result<WaitOutcome, ScenarioError> {
        let outcome = poller.wait_for_ready(session, marker).await?;
        run.report.record_step(&format!("wait-{}", phase), outcome.elapsed);
        run.report.record_pod(phase, &outcome);
        Ok(outcome)
    }

    async fn settle(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        info!("Waiting {:?} for services and routes to settle", delay);
        tokio::time::sleep(delay).await;
    }

    async fn validate(
        &self,
        session: &Session,
        checks: &[ContentCheck],
        run: &mut ScenarioRun,
    ) -> Result<(), ScenarioError> {
        let started = Instant::now();
        self.validator.validate(session, checks).await?;
        run.step_done("validate", started);
        Ok(())
    }

    async fn teardown(&self, run: &mut ScenarioRun) {
        let store = ConfigDataStore::new(self.client.as_ref());
        for name in run.config_entries.drain(..) {
            match store.delete(&name).await {
                Ok(true) => info!("Deleted config entry {}", name),
                Ok(false) => debug!("Config entry {} was already gone", name),
                Err(e) => warn!("Failed to delete config entry {}: {}", name, e),
            }
        }

        if let Some(copy) = run.working_copy.take() {
            copy.remove();
        }
    }
}
