//! Command implementations for the CLI
//!
//! SBIO pattern: argument handling is pure; the async commands take their
//! cluster and HTTP clients from the caller.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::{RunArgs, ValidateArgs, WaitArgs};
use crate::cluster::{ClusterError, ResourceClient};
use crate::config::{self, load_scenario_file, ScenarioConfig, ScenarioConfigError};
use crate::http::HttpClient;
use crate::model::{parse_pair, ApplicationIdentity, ModelError, RedeploymentMarker};
use crate::poller::{ReadinessPoller, WaitError, WaitOutcome, WaitSettings};
use crate::session::Session;
use crate::validator::{
    ContentCheck, DeploymentValidator, ValidatedResources, ValidationError,
    DEFAULT_CONTENT_FIELD,
};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ScenarioConfigError),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ModelError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Argument handling (Pure business logic)
// ============================================================================

/// Scenario selected by `run`, with command-line overrides applied
pub fn resolve_scenario(args: &RunArgs) -> CommandResult<ScenarioConfig> {
    let mut scenario = match (&args.file, &args.preset) {
        (Some(file), _) => load_scenario_file(file)?,
        (None, Some(name)) => config::preset(name)?,
        (None, None) => {
            return Err(ScenarioConfigError::Invalid(
                "a scenario file or --preset is required".to_string(),
            )
            .into())
        }
    };

    if let Some(version) = &args.plugin_version {
        scenario = scenario.with_plugin_version(version);
    }
    if let Some(namespace) = &args.namespace {
        scenario.namespace = Some(namespace.clone());
    }
    Ok(scenario)
}

pub fn wait_settings(args: &WaitArgs) -> WaitSettings {
    WaitSettings {
        attempts: args.attempts.max(1),
        interval: Duration::from_secs(args.interval),
        label_key: args.label_key.clone(),
    }
}

pub fn wait_marker(args: &WaitArgs) -> CommandResult<Option<RedeploymentMarker>> {
    args.marker
        .as_deref()
        .map(|raw| -> CommandResult<RedeploymentMarker> {
            let (key, value) = parse_pair(raw)?;
            Ok(RedeploymentMarker::new(key, value)?)
        })
        .transpose()
}

/// Content check described by `--expect`/`--query`; `--expect VALUE`
/// without a field name compares the default field
pub fn content_check(args: &ValidateArgs) -> CommandResult<Option<ContentCheck>> {
    let expect = match &args.expect {
        Some(expect) => expect,
        None => return Ok(None),
    };

    let (field, expected) = match parse_pair(expect) {
        Ok(pair) => pair,
        Err(_) => (DEFAULT_CONTENT_FIELD.to_string(), expect.clone()),
    };

    let mut check = ContentCheck::greeting(&expected);
    check.field = field;
    check.path = args.path.clone();
    for raw in &args.query {
        let (key, value) = parse_pair(raw)?;
        check = check.with_query(&key, &value);
    }
    Ok(Some(check))
}

// ============================================================================
// Cluster commands (I/O through the given clients)
// ============================================================================

pub async fn wait_command(
    args: &WaitArgs,
    client: Arc<dyn ResourceClient>,
    http: Arc<dyn HttpClient>,
) -> CommandResult<WaitOutcome> {
    let marker = wait_marker(args)?;
    let session = Session::new(ApplicationIdentity::new(args.app.clone())?, client, http)?;
    let poller = ReadinessPoller::new(wait_settings(args));
    Ok(poller.wait_for_ready(&session, marker.as_ref()).await?)
}

pub async fn validate_command(
    args: &ValidateArgs,
    client: Arc<dyn ResourceClient>,
    http: Arc<dyn HttpClient>,
) -> CommandResult<ValidatedResources> {
    let checks: Vec<ContentCheck> = content_check(args)?.into_iter().collect();
    let session = Session::new(ApplicationIdentity::new(args.app.clone())?, client, http)?;
    Ok(DeploymentValidator::new().validate(&session, &checks).await?)
}
