mod cleaner;
mod cli;
mod config;
mod error;
mod models;
mod output;
mod policy;
mod registry;
mod run_api;

use std::future::Future;
use std::path::Path;
use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use config::{default_config_path, Config};
use output::print_summary;
use policy::CleanupOptions;
use registry::GcloudRegistry;
use run_api::CloudRunClient;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (config, control_plane) =
        load_then_connect(&config_path, CloudRunClient::from_environment).await?;
    let registry = GcloudRegistry::new(&cli.gcloud);
    let options = CleanupOptions {
        dry_run: cli.dry_run,
    };

    let summary = cleaner::run_cleanup(&config, &control_plane, &registry, options).await?;
    print_summary(&summary, options.dry_run);

    Ok(())
}

/// Load the configuration, then build the API client. The client is never
/// constructed when the configuration is missing or incomplete.
async fn load_then_connect<C, F, Fut>(config_path: &Path, connect: F) -> Result<(Config, C)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C>>,
{
    let config = Config::load(config_path)?;
    debug!(
        path = %config.path.display(),
        project = %config.project,
        region = %config.region,
        "loaded gcloud config"
    );

    let client = connect().await?;
    Ok((config, client))
}
