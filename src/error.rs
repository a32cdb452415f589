//! Scenario-level failures. Every failure aborts the rest of the scenario;
//! the kind tells which phase to look at.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::config::ScenarioConfigError;
use crate::model::ModelError;
use crate::poller::{TimeoutError, WaitError};
use crate::project::{BuildError, DescriptorError, SourceError};
use crate::validator::ValidationError;

/// Failures before anything is deployed
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Checkout failed: {0}")]
    Source(#[from] SourceError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Invalid application identity: {0}")]
    Identity(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ScenarioConfigError),
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error("Assertion failed: {0}")]
    Assertion(ValidationError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Setup,
    Build,
    Timeout,
    Assertion,
    Cluster,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Setup => "setup",
            FailureKind::Build => "build",
            FailureKind::Timeout => "timeout",
            FailureKind::Assertion => "assertion",
            FailureKind::Cluster => "cluster",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScenarioError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScenarioError::Setup(_) => FailureKind::Setup,
            ScenarioError::Build(_) => FailureKind::Build,
            ScenarioError::Timeout(_) => FailureKind::Timeout,
            ScenarioError::Assertion(_) => FailureKind::Assertion,
            ScenarioError::Cluster(_) => FailureKind::Cluster,
        }
    }
}

impl From<WaitError> for ScenarioError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout(timeout) => ScenarioError::Timeout(timeout),
            WaitError::Cluster(cluster) => ScenarioError::Cluster(cluster),
        }
    }
}

impl From<ValidationError> for ScenarioError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Cluster(cluster) => ScenarioError::Cluster(cluster),
            other => ScenarioError::Assertion(other),
        }
    }
}

impl From<SourceError> for ScenarioError {
    fn from(err: SourceError) -> Self {
        ScenarioError::Setup(err.into())
    }
}

impl From<DescriptorError> for ScenarioError {
    fn from(err: DescriptorError) -> Self {
        ScenarioError::Setup(err.into())
    }
}

impl From<ScenarioConfigError> for ScenarioError {
    fn from(err: ScenarioConfigError) -> Self {
        ScenarioError::Setup(err.into())
    }
}

impl From<ModelError> for ScenarioError {
    fn from(err: ModelError) -> Self {
        ScenarioError::Setup(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApplicationIdentity;
    use std::time::Duration;

    #[test]
    fn test_wait_errors_keep_their_kind() {
        let timeout = WaitError::Timeout(TimeoutError {
            identity: ApplicationIdentity::new("greeting-service").unwrap(),
            marker: None,
            attempts: 60,
            elapsed: Duration::from_secs(300),
        });
        let err = ScenarioError::from(timeout);
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.to_string().contains("greeting-service"));

        let cluster = WaitError::Cluster(ClusterError::Connect("refused".to_string()));
        assert_eq!(ScenarioError::from(cluster).kind(), FailureKind::Cluster);
    }

    #[test]
    fn test_validation_errors_are_assertions() {
        let err = ScenarioError::from(ValidationError::MissingRoute("greeting-service".to_string()));
        assert_eq!(err.kind(), FailureKind::Assertion);
        assert!(err.to_string().contains("greeting-service"));

        let transport =
            ScenarioError::from(ValidationError::Cluster(ClusterError::Connect("x".to_string())));
        assert_eq!(transport.kind(), FailureKind::Cluster);
    }

    #[test]
    fn test_setup_kinds() {
        let err = ScenarioError::from(ModelError::EmptyIdentity);
        assert_eq!(err.kind(), FailureKind::Setup);
        let err = ScenarioError::from(DescriptorError::NotAProject("settings".to_string()));
        assert_eq!(err.kind(), FailureKind::Setup);
        assert_eq!(FailureKind::Build.to_string(), "build");
    }
}
