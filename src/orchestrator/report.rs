//! Outcome of one scenario run

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::{FailureKind, ScenarioError};
use crate::poller::WaitOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioState {
    Uninitialized,
    Deployed,
    Mutated,
    Redeployed,
    Validated,
    Failed,
}

impl ScenarioState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioState::Uninitialized => "uninitialized",
            ScenarioState::Deployed => "deployed",
            ScenarioState::Mutated => "mutated",
            ScenarioState::Redeployed => "redeployed",
            ScenarioState::Validated => "validated",
            ScenarioState::Failed => "failed",
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

/// Pod that satisfied one of the readiness waits
#[derive(Debug, Clone, Serialize)]
pub struct ObservedPod {
    pub phase: String,
    pub pod: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ScenarioError> for FailureReport {
    fn from(err: &ScenarioError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub namespace: Option<String>,
    pub identity: Option<String>,
    pub state: ScenarioState,
    pub steps: Vec<StepReport>,
    pub pods: Vec<ObservedPod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScenarioReport {
    pub fn new(scenario: &str) -> Self {
        let now = Utc::now();
        Self {
            scenario: scenario.to_string(),
            namespace: None,
            identity: None,
            state: ScenarioState::Uninitialized,
            steps: Vec::new(),
            pods: Vec::new(),
            failure: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.state != ScenarioState::Failed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|failure| failure.kind)
    }

    pub fn record_step(&mut self, step: &str, elapsed: Duration) {
        self.steps.push(StepReport {
            step: step.to_string(),
            elapsed,
        });
    }

    pub fn record_pod(&mut self, phase: &str, outcome: &WaitOutcome) {
        self.pods.push(ObservedPod {
            phase: phase.to_string(),
            pod: outcome.pod.clone(),
            attempts: outcome.attempts,
        });
    }

    /// Pod observed ready during `phase`
    pub fn pod(&self, phase: &str) -> Option<&str> {
        self.pods
            .iter()
            .find(|observed| observed.phase == phase)
            .map(|observed| observed.pod.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes() {
        let mut report = ScenarioReport::new("http-deploy");
        report.state = ScenarioState::Deployed;
        report.record_step("build", Duration::from_millis(1500));
        report.record_pod(
            "deploy",
            &WaitOutcome {
                pod: "vertx-http-1-abcde".to_string(),
                attempts: 3,
                elapsed: Duration::from_secs(10),
            },
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "deployed");
        assert_eq!(json["steps"][0]["elapsed_ms"], 1500);
        assert_eq!(json["pods"][0]["pod"], "vertx-http-1-abcde");
        assert!(json.get("failure").is_none());
        assert!(report.succeeded());
        assert_eq!(report.pod("deploy"), Some("vertx-http-1-abcde"));
        assert_eq!(report.pod("redeploy"), None);
    }

    #[test]
    fn test_failure_report() {
        let err = ScenarioError::Assertion(crate::validator::ValidationError::MissingService(
            "greeting-service".to_string(),
        ));
        let mut report = ScenarioReport::new("configmap-deploy");
        report.state = ScenarioState::Failed;
        report.failure = Some(FailureReport::from(&err));

        assert!(!report.succeeded());
        assert_eq!(report.failure_kind(), Some(FailureKind::Assertion));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failure"]["kind"], "assertion");
    }
}
