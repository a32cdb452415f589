//! Readiness polling
//!
//! Watches the application's pods until one of them is ready, optionally
//! requiring a redeployment marker annotation so that a pod left over from
//! the previous rollout cannot satisfy the wait.
//!
//! The loop is bounded: `attempts` listings, each followed by a sleep of
//! `interval` when nothing matched. Reaching the bound is a [`TimeoutError`].
//! Every call gets a fresh budget.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::cluster::ClusterError;
use crate::model::{ApplicationIdentity, PodObservation, RedeploymentMarker};
use crate::session::Session;

/// Listings before giving up (60 x 5s = 5 minutes)
pub const DEFAULT_POLL_ATTEMPTS: u32 = 60;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Label the build plugin stamps with the artifact name
pub const DEFAULT_LABEL_KEY: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    pub attempts: u32,
    pub interval: Duration,
    pub label_key: String,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
            label_key: DEFAULT_LABEL_KEY.to_string(),
        }
    }
}

impl WaitSettings {
    /// Longest a single wait can take
    pub fn ceiling(&self) -> Duration {
        self.interval * self.attempts
    }
}

#[derive(Error, Debug)]
#[error(
    "Pod wait timeout: no ready pod for application '{identity}'{} after {attempts} attempts ({elapsed:?})",
    awaiting(.marker)
)]
pub struct TimeoutError {
    pub identity: ApplicationIdentity,
    pub marker: Option<RedeploymentMarker>,
    pub attempts: u32,
    pub elapsed: Duration,
}

fn awaiting(marker: &Option<RedeploymentMarker>) -> String {
    match marker {
        Some(marker) => format!(" carrying marker {}", marker),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Failed to list pods: {0}")]
    Cluster(#[from] ClusterError),
}

/// The pod that ended a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    pub pod: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Ready predicate: healthy, and carrying the marker when one is required
pub fn satisfies(pod: &PodObservation, marker: Option<&RedeploymentMarker>) -> bool {
    match marker {
        None => pod.ready,
        Some(marker) => pod.ready && pod.carries(marker),
    }
}

/// Any pod of the listing that satisfies the predicate
pub fn find_ready<'a>(
    pods: &'a [PodObservation],
    marker: Option<&RedeploymentMarker>,
) -> Option<&'a PodObservation> {
    pods.iter().find(|pod| satisfies(pod, marker))
}

// ============================================================================
// SBIO: Polling loop (I/O through the session's client)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReadinessPoller {
    settings: WaitSettings,
}

impl ReadinessPoller {
    pub fn new(settings: WaitSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    pub async fn wait_for_ready(
        &self,
        session: &Session,
        marker: Option<&RedeploymentMarker>,
    ) -> Result<WaitOutcome, WaitError> {
        let identity = session.identity();
        let selector = identity.pod_selector(&self.settings.label_key);
        let started = Instant::now();

        match marker {
            Some(marker) => info!(
                "Waiting for application pod {} carrying {} ...",
                selector, marker
            ),
            None => info!("Waiting for application pod {} ...", selector),
        }

        for attempt in 1..=self.settings.attempts {
            let pods = session.client().list_pods(&selector).await?;

            for pod in &pods {
                debug!(
                    "Poll {}/{} -> Pod: {}, STATUS: {}, ready: {}",
                    attempt, self.settings.attempts, pod.name, pod.phase, pod.ready
                );
                if let Some(marker) = marker {
                    if pod.annotation(&marker.key).is_some() {
                        debug!("{} is a redeployed pod", pod.name);
                    }
                }
            }

            if let Some(pod) = find_ready(&pods, marker) {
                let elapsed = started.elapsed();
                info!(
                    "OK, pod {} is ready after {} attempt(s) ({:?})",
                    pod.name, attempt, elapsed
                );
                return Ok(WaitOutcome {
                    pod: pod.name.clone(),
                    attempts: attempt,
                    elapsed,
                });
            }

            sleep(self.settings.interval).await;
        }

        let timeout = TimeoutError {
            identity: identity.clone(),
            marker: marker.cloned(),
            attempts: self.settings.attempts,
            elapsed: started.elapsed(),
        };
        error!("{}", timeout);
        Err(timeout.into())
    }
}
