//! Post-deploy assertions
//!
//! Confirms the workload, service and route named after the application
//! exist, then reads the application through its route and compares a JSON
//! field against an expected literal. Every missing resource and every
//! content problem is its own [`ValidationError`] variant so a failed run
//! says exactly what was wrong.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::cluster::{ClusterError, WorkloadSummary};
use crate::http::{HttpError, HttpMethod};
use crate::model::RedeploymentMarker;
use crate::session::Session;

/// Endpoint served by the sample applications
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/greeting";

/// JSON field carrying the greeting
pub const DEFAULT_CONTENT_FIELD: &str = "content";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Workload '{0}' not found (no Deployment or DeploymentConfig)")]
    MissingWorkload(String),

    #[error("Service '{0}' not found")]
    MissingService(String),

    #[error("Route '{0}' not found")]
    MissingRoute(String),

    #[error("Route '{0}' has no host assigned")]
    RouteWithoutHost(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("GET {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("GET {url} returned a body that is not JSON: {reason}")]
    UndecodableBody { url: String, reason: String },

    #[error("GET {url}: field '{field}' missing or not a string")]
    MissingField { url: String, field: String },

    #[error("GET {url}: field '{field}' expected '{expected}', got '{actual}'")]
    ContentMismatch {
        url: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Workload '{workload}' does not carry the redeployment annotation {marker} (found {found})")]
    MissingAnnotation {
        workload: String,
        marker: String,
        found: String,
    },

    #[error("Redeployed wait matched pod '{0}', which was already serving before the redeploy")]
    StalePod(String),

    #[error("Request to the application failed: {0}")]
    Http(#[from] HttpError),

    #[error("Cluster lookup failed: {0}")]
    Cluster(#[from] ClusterError),
}

/// One GET against the application and the field it must return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCheck {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    #[serde(default = "default_field")]
    pub field: String,

    pub expected: String,
}

fn default_path() -> String {
    DEFAULT_ENDPOINT_PATH.to_string()
}

fn default_field() -> String {
    DEFAULT_CONTENT_FIELD.to_string()
}

impl ContentCheck {
    /// Check of the default greeting endpoint and field
    pub fn greeting(expected: &str) -> Self {
        Self {
            path: default_path(),
            query: BTreeMap::new(),
            field: default_field(),
            expected: expected.to_string(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    /// URL of this check against a route host
    pub fn url(&self, host: &str) -> Result<reqwest::Url, ValidationError> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}{}", host.trim_end_matches('/'), self.path)
        } else {
            format!("http://{}{}", host, self.path)
        };
        let parsed = if self.query.is_empty() {
            reqwest::Url::parse(&base)
        } else {
            reqwest::Url::parse_with_params(&base, &self.query)
        };
        parsed.map_err(|e| ValidationError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })
    }
}

/// What the existence checks found
#[derive(Debug, Clone)]
pub struct ValidatedResources {
    pub workload: WorkloadSummary,
    pub route_host: Option<String>,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Compare one field of a decoded body against the check
pub fn compare_field(url: &str, body: &Value, check: &ContentCheck) -> Result<(), ValidationError> {
    let actual = body
        .get(&check.field)
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::MissingField {
            url: url.to_string(),
            field: check.field.clone(),
        })?;

    if actual != check.expected {
        return Err(ValidationError::ContentMismatch {
            url: url.to_string(),
            field: check.field.clone(),
            expected: check.expected.clone(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SBIO: Validator with I/O (through the session)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentValidator;

impl DeploymentValidator {
    pub fn new() -> Self {
        Self
    }

    /// Workload, service and route must all exist; each absence is reported
    /// on its own.
    pub async fn check_resources(
        &self,
        session: &Session,
    ) -> Result<ValidatedResources, ValidationError> {
        let expected = session.identity().expected_resources();
        let client = session.client();

        let workload = client
            .get_workload(&expected.workload)
            .await?
            .ok_or_else(|| ValidationError::MissingWorkload(expected.workload.clone()))?;
        debug!("Found {} {}", workload.kind.as_str(), workload.name);

        client
            .get_service(&expected.service)
            .await?
            .ok_or_else(|| ValidationError::MissingService(expected.service.clone()))?;
        debug!("Found Service {}", expected.service);

        let route = client
            .get_route(&expected.route)
            .await?
            .ok_or_else(|| ValidationError::MissingRoute(expected.route.clone()))?;
        debug!(
            "Found Route {} (host: {})",
            route.name,
            route.host.as_deref().unwrap_or("-")
        );

        Ok(ValidatedResources {
            workload,
            route_host: route.host,
        })
    }

    pub async fn check_content(
        &self,
        session: &Session,
        host: &str,
        check: &ContentCheck,
    ) -> Result<(), ValidationError> {
        let url = check.url(host)?;
        let url = url.as_str();
        let response = session.http().request(HttpMethod::Get, url, None).await?;

        if !response.is_success() {
            return Err(ValidationError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| ValidationError::UndecodableBody {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        compare_field(url, &body, check)?;
        info!("OK, {} -> {} = '{}'", url, check.field, check.expected);
        Ok(())
    }

    /// Existence checks followed by every content check, in order
    pub async fn validate(
        &self,
        session: &Session,
        checks: &[ContentCheck],
    ) -> Result<ValidatedResources, ValidationError> {
        let resources = self.check_resources(session).await?;

        if !checks.is_empty() {
            let route = session.identity().expected_resources().route;
            let host = resources
                .route_host
                .as_deref()
                .ok_or(ValidationError::RouteWithoutHost(route))?;
            for check in checks {
                self.check_content(session, host, check).await?;
            }
        }

        info!(
            "Deployment of '{}' in namespace '{}' validated",
            session.identity(),
            session.namespace()
        );
        Ok(resources)
    }

    /// The application's own workload must carry this run's marker
    pub async fn check_workload_marker(
        &self,
        session: &Session,
        marker: &RedeploymentMarker,
    ) -> Result<(), ValidationError> {
        let name = session.identity().expected_resources().workload;
        let workload = session
            .client()
            .get_workload(&name)
            .await?
            .ok_or_else(|| ValidationError::MissingWorkload(name.clone()))?;

        if workload.carries(marker) {
            debug!(
                "{} {} carries annotation {}",
                workload.kind.as_str(),
                workload.name,
                marker
            );
            return Ok(());
        }
        Err(ValidationError::MissingAnnotation {
            workload: workload.name.clone(),
            marker: marker.to_string(),
            found: workload
                .annotation(&marker.key)
                .map(|value| format!("'{}'", value))
                .unwrap_or_else(|| "none".to_string()),
        })
    }
}
