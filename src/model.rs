//! Domain values shared by the poller, validator and orchestrator.
//!
//! Everything here is plain data: no I/O, no cluster handles.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("application identity must not be empty")]
    EmptyIdentity,

    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("marker key must not be empty")]
    EmptyMarkerKey,

    #[error("expected KEY=VALUE, got '{0}'")]
    InvalidPair(String),
}

/// Cluster scope for every operation of one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyNamespace);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artifact name that correlates the workload, service, route and pods of
/// the deployed application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationIdentity(String);

impl ApplicationIdentity {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyIdentity);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of the resources a successful deploy must leave behind
    pub fn expected_resources(&self) -> ExpectedResourceSet {
        ExpectedResourceSet {
            workload: self.0.clone(),
            service: self.0.clone(),
            route: self.0.clone(),
        }
    }

    /// Label selector matching the application's pods
    pub fn pod_selector(&self, label_key: &str) -> LabelSelector {
        LabelSelector::new(label_key, &self.0)
    }
}

impl fmt::Display for ApplicationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workload, service and route names derived from an [`ApplicationIdentity`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedResourceSet {
    pub workload: String,
    pub service: String,
    pub route: String,
}

/// Single `key=value` equality selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Point-in-time snapshot of one pod, produced fresh on every poll
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodObservation {
    pub name: String,
    pub ready: bool,
    pub phase: String,
    pub annotations: BTreeMap<String, String>,
}

impl PodObservation {
    pub fn new(name: &str, ready: bool, phase: &str) -> Self {
        Self {
            name: name.to_string(),
            ready,
            phase: phase.to_string(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    /// Annotation value for `key`; pods without annotations simply have none
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// True when the pod carries `marker` (value compared case-insensitively)
    pub fn carries(&self, marker: &RedeploymentMarker) -> bool {
        self.annotation(&marker.key)
            .map(|value| value.eq_ignore_ascii_case(&marker.value))
            .unwrap_or(false)
    }
}

/// Annotation injected before a redeploy so the new pod can be told apart
/// from pods of the previous rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeploymentMarker {
    pub key: String,
    pub value: String,
}

impl RedeploymentMarker {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ModelError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ModelError::EmptyMarkerKey);
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    /// Marker with a random value, unique to this run
    pub fn generated(key: impl Into<String>) -> Result<Self, ModelError> {
        Self::new(key, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RedeploymentMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Named key/value config object consumed by the running application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl ConfigEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

/// Split a `KEY=VALUE` argument
pub fn parse_pair(raw: &str) -> Result<(String, String), ModelError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ModelError::InvalidPair(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rejects_empty() {
        assert_eq!(
            ApplicationIdentity::new("  "),
            Err(ModelError::EmptyIdentity)
        );
        assert!(ApplicationIdentity::new("greeting-service").is_ok());
    }

    #[test]
    fn test_expected_resources_share_identity() {
        let identity = ApplicationIdentity::new("vertx-http").unwrap();
        let expected = identity.expected_resources();
        assert_eq!(expected.workload, "vertx-http");
        assert_eq!(expected.service, "vertx-http");
        assert_eq!(expected.route, "vertx-http");
        assert_eq!(identity.pod_selector("app").to_string(), "app=vertx-http");
    }

    #[test]
    fn test_pod_without_annotations_does_not_carry_marker() {
        let marker = RedeploymentMarker::new("vertx-testKey", "vertx-testValue").unwrap();
        let pod = PodObservation::new("web-1", true, "Running");
        assert!(!pod.carries(&marker));
    }

    #[test]
    fn test_marker_value_is_case_insensitive() {
        let marker = RedeploymentMarker::new("vertx-testKey", "vertx-testValue").unwrap();
        let pod = PodObservation::new("web-2", true, "Running")
            .with_annotation("vertx-testKey", "VERTX-TESTVALUE");
        assert!(pod.carries(&marker));

        let other_key = PodObservation::new("web-3", true, "Running")
            .with_annotation("VERTX-TESTKEY", "vertx-testValue");
        assert!(!other_key.carries(&marker));
    }

    #[test]
    fn test_generated_markers_differ() {
        let a = RedeploymentMarker::generated("deployprobe/redeploy").unwrap();
        let b = RedeploymentMarker::generated("deployprobe/redeploy").unwrap();
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("name=vertx").unwrap(),
            ("name".to_string(), "vertx".to_string())
        );
        assert_eq!(
            parse_pair("greeting=a=b").unwrap(),
            ("greeting".to_string(), "a=b".to_string())
        );
        assert!(matches!(parse_pair("novalue"), Err(ModelError::InvalidPair(_))));
        assert!(matches!(parse_pair("=x"), Err(ModelError::InvalidPair(_))));
    }
}
