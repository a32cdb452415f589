//! Scenario files: what to check out, how to build it, what to assert.

pub mod presets;

pub use presets::{preset, preset_names};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ConfigEntry, ModelError, RedeploymentMarker};
use crate::poller::{WaitSettings, DEFAULT_LABEL_KEY, DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::project::Dependency;
use crate::validator::ContentCheck;

/// Pause between readiness and validation while routes and services catch up
pub const DEFAULT_SETTLE_SECS: u64 = 20;

pub const DEFAULT_PROFILE: &str = "openshift";
pub const DEFAULT_GOALS: &str = "fabric8:deploy";
pub const DEFAULT_PLUGIN_KEY: &str = "io.fabric8:fabric8-maven-plugin";

#[derive(Error, Debug)]
pub enum ScenarioConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Cannot expand '{field}': {reason}")]
    Expand { field: &'static str, reason: String },

    #[error("Invalid scenario: {0}")]
    Invalid(String),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

fn default_descriptor() -> String {
    "pom.xml".to_string()
}

fn default_goals() -> String {
    DEFAULT_GOALS.to_string()
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_plugin_key() -> String {
    DEFAULT_PLUGIN_KEY.to_string()
}

fn default_attempts() -> u32 {
    DEFAULT_POLL_ATTEMPTS
}

fn default_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_label_key() -> String {
    DEFAULT_LABEL_KEY.to_string()
}

fn default_settle_secs() -> u64 {
    DEFAULT_SETTLE_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Descriptor path relative to the checkout root
    #[serde(default = "default_descriptor")]
    pub descriptor: String,
    #[serde(default = "default_goals")]
    pub goals: String,
    #[serde(default = "default_profile")]
    pub profile: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            goals: default_goals(),
            profile: default_profile(),
        }
    }
}

/// Plugin under test; its version is pinned in the checkout before building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_plugin_key")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Descriptor whose project version is the version under test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_from: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    pub key: String,
    /// Generated per run when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl MarkerConfig {
    pub fn resolve(&self) -> Result<RedeploymentMarker, ModelError> {
        match &self.value {
            Some(value) => RedeploymentMarker::new(self.key.clone(), value.clone()),
            None => RedeploymentMarker::generated(self.key.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeployConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_dependency: Option<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerConfig>,
    /// Profile whose plugin configuration receives the marker annotations
    #[serde(default = "default_profile")]
    pub annotation_profile: String,
    /// New data for the scenario's config entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_data: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub checks: Vec<ContentCheck>,
}

impl RedeployConfig {
    pub fn mutates_anything(&self) -> bool {
        self.add_dependency.is_some() || self.marker.is_some() || self.config_data.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_label_key")]
    pub label_key: String,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_secs: default_interval_secs(),
            label_key: default_label_key(),
        }
    }
}

impl WaitConfig {
    pub fn settings(&self) -> WaitSettings {
        WaitSettings {
            attempts: self.attempts,
            interval: Duration::from_secs(self.interval_secs),
            label_key: self.label_key.clone(),
        }
    }
}

/// One deploy (and optional redeploy) of a sample project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub repository: String,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginConfig>,
    /// Overrides the client's default namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Bind the `view` role to the default service account before deploying
    #[serde(default)]
    pub grant_view_role: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_entry: Option<ConfigEntry>,
    #[serde(default)]
    pub checks: Vec<ContentCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeploy: Option<RedeployConfig>,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

fn expand(field: &'static str, value: &str) -> Result<String, ScenarioConfigError> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ScenarioConfigError::Expand {
            field,
            reason: e.to_string(),
        })
}

impl ScenarioConfig {
    /// Parse a scenario document, expand `${VAR}` and `~` in the fields that
    /// name external things, and validate it.
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioConfigError> {
        let mut config: ScenarioConfig = serde_yaml::from_str(content)?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    fn expand_env(&mut self) -> Result<(), ScenarioConfigError> {
        self.repository = expand("repository", &self.repository)?;
        if let Some(namespace) = &self.namespace {
            self.namespace = Some(expand("namespace", namespace)?);
        }
        if let Some(plugin) = &mut self.plugin {
            if let Some(version) = &plugin.version {
                plugin.version = Some(expand("plugin.version", version)?);
            }
            if let Some(path) = &plugin.version_from {
                let expanded = expand("plugin.version_from", &path.to_string_lossy())?;
                plugin.version_from = Some(PathBuf::from(expanded));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScenarioConfigError> {
        let invalid = |reason: &str| -> Result<(), ScenarioConfigError> {
            Err(ScenarioConfigError::Invalid(reason.to_string()))
        };

        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.repository.trim().is_empty() {
            return invalid("repository must not be empty");
        }
        if self.build.descriptor.trim().is_empty() {
            return invalid("build.descriptor must not be empty");
        }
        if self.build.goals.trim().is_empty() {
            return invalid("build.goals must not be empty");
        }
        if self.wait.attempts == 0 {
            return invalid("wait.attempts must be at least 1");
        }
        if let Some(plugin) = &self.plugin {
            if plugin.version.is_none() && plugin.version_from.is_none() {
                return invalid("plugin needs either version or version_from");
            }
        }
        if let Some(redeploy) = &self.redeploy {
            if !redeploy.mutates_anything() {
                return invalid("redeploy must add a dependency, a marker or new config data");
            }
            if redeploy.config_data.is_some() && self.config_entry.is_none() {
                return invalid("redeploy.config_data requires a config_entry");
            }
            if let Some(marker) = &redeploy.marker {
                marker.resolve()?;
            }
        }
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Pin `version` for the default plugin key, keeping an explicit key if set
    pub fn with_plugin_version(mut self, version: &str) -> Self {
        let key = self
            .plugin
            .take()
            .map(|plugin| plugin.key)
            .unwrap_or_else(default_plugin_key);
        self.plugin = Some(PluginConfig {
            key,
            version: Some(version.to_string()),
            version_from: None,
        });
        self
    }

    pub fn to_yaml(&self) -> Result<String, ScenarioConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load and validate a scenario file from disk
pub fn load_scenario_file(path: &Path) -> Result<ScenarioConfig, ScenarioConfigError> {
    let content = std::fs::read_to_string(path)?;
    ScenarioConfig::from_yaml(&content)
}
