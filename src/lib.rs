//! deployprobe - verify that a build plugin deploys, redeploys and
//! reconfigures a sample application on an OpenShift/Kubernetes cluster.
//!
//! A scenario checks out a sample project, pins the plugin under test, runs
//! the build that deploys it, waits for a ready pod, validates the workload,
//! service and route and the application's HTTP response, and optionally
//! repeats all of it after mutating the project or its config data.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod project;
pub mod session;
pub mod store;
pub mod validator;

pub use error::{FailureKind, ScenarioError};
pub use orchestrator::{ScenarioReport, ScenarioRunner, ScenarioState};
pub use session::Session;
