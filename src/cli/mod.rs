//! CLI module for deployprobe
//!
//! Subcommands:
//! - `deployprobe run` - Run a scenario file or a built-in preset
//! - `deployprobe wait` - Wait for an application's pod to become ready
//! - `deployprobe validate` - Check an application's resources and content
//! - `deployprobe presets` - List the built-in scenarios
//! - `deployprobe check` - Parse a scenario file without touching the cluster

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "deployprobe")]
#[command(about = "Deploy sample applications with a build plugin and verify the rollout")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a .env file loaded before anything else
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one deploy/redeploy scenario and print its report
    Run(RunArgs),

    /// Wait until a pod of the application is ready
    Wait(WaitArgs),

    /// Validate the deployed resources and the application's response
    Validate(ValidateArgs),

    /// List the built-in scenarios
    Presets,

    /// Parse a scenario file and print it (dry run)
    Check(CheckArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file (YAML)
    #[arg(required_unless_present = "preset", conflicts_with = "preset")]
    pub file: Option<PathBuf>,

    /// Built-in scenario to run instead of a file
    #[arg(long)]
    pub preset: Option<String>,

    /// Version of the build plugin under test
    #[arg(long, env = "DEPLOYPROBE_PLUGIN_VERSION")]
    pub plugin_version: Option<String>,

    /// Namespace (default: the scenario's, else the kubeconfig's)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the wait command
#[derive(Parser, Debug)]
pub struct WaitArgs {
    /// Application name (artifact id)
    pub app: String,

    /// Only accept pods annotated with KEY=VALUE
    #[arg(long, value_name = "KEY=VALUE")]
    pub marker: Option<String>,

    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Maximum number of polls
    #[arg(long, default_value = "60")]
    pub attempts: u32,

    /// Seconds between polls
    #[arg(long, default_value = "5")]
    pub interval: u64,

    /// Pod label carrying the application name
    #[arg(long, default_value = "app")]
    pub label_key: String,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Application name (artifact id)
    pub app: String,

    /// Expected response field, e.g. content=Hello, World!
    #[arg(long, value_name = "FIELD=VALUE")]
    pub expect: Option<String>,

    /// Query parameter added to the request (repeatable)
    #[arg(long, value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Endpoint path
    #[arg(long, default_value = "/api/greeting")]
    pub path: String,

    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Scenario file (YAML)
    pub file: PathBuf,
}
