use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deployprobe::cli::{
    format_presets, format_report, format_scenario, format_validated, format_wait,
    resolve_scenario, validate_command, wait_command, Cli, Commands,
};
use deployprobe::cluster::{KubeResourceClient, ResourceClient};
use deployprobe::config::{load_scenario_file, preset_names};
use deployprobe::http::{HttpClient, ReqwestHttpClient};
use deployprobe::project::{GitSource, MavenBuild};
use deployprobe::ScenarioRunner;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = cli.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    match execute(cli.command).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn connect(namespace: Option<&str>) -> anyhow::Result<Arc<dyn ResourceClient>> {
    let client = KubeResourceClient::connect(namespace)
        .await
        .context("Failed to connect to the cluster")?;
    info!("Using namespace {}", client.namespace());
    Ok(Arc::new(client))
}

fn http_client() -> anyhow::Result<Arc<dyn HttpClient>> {
    let client = ReqwestHttpClient::new().context("Failed to create HTTP client")?;
    Ok(Arc::new(client))
}

async fn execute(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Presets => {
            print!("{}", format_presets(&preset_names()));
            Ok(0)
        }

        Commands::Check(args) => {
            let scenario = load_scenario_file(&args.file).with_context(|| {
                format!("Failed to load scenario file {}", args.file.display())
            })?;
            print!("{}", format_scenario(&scenario));
            Ok(0)
        }

        Commands::Run(args) => {
            let scenario = resolve_scenario(&args)?;
            let client = connect(scenario.namespace.as_deref()).await?;

            let runner = ScenarioRunner::new(
                Arc::new(GitSource::new()),
                Arc::new(MavenBuild::new()),
                client,
                http_client()?,
            );
            let report = runner.run(&scenario).await;
            // Releases the cluster client
            drop(runner);

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", format_report(&report));
            }
            Ok(if report.succeeded() { 0 } else { 1 })
        }

        Commands::Wait(args) => {
            let client = connect(args.namespace.as_deref()).await?;
            let outcome = wait_command(&args, client, http_client()?).await?;
            print!("{}", format_wait(&outcome));
            Ok(0)
        }

        Commands::Validate(args) => {
            let client = connect(args.namespace.as_deref()).await?;
            let resources = validate_command(&args, client, http_client()?).await?;
            print!("{}", format_validated(&args.app, &resources));
            Ok(0)
        }
    }
}
