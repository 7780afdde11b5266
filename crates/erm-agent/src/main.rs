use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use erm_core::{AgentConfig, ResourceManager, ResourceTree};
use erm_edge::EdgeClient;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(
    name = "edge-resource-manager",
    about = "Edge resource manager: exposes edge capabilities to edge-core as LWM2M resources"
)]
struct Cli {
    /// Config path
    #[arg(long, default_value = "./izuma-base-config.yaml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Validate the config and print the resource tree without connecting
    #[arg(long)]
    check: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("ERM_LOG")
        .from_env_lossy();

    // stderr keeps stdout free for --check output
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    tracing::info!(config = %cli.config.display(), "edge-resource-manager starting");

    let config = AgentConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?
        .into_resource_manager()
        .context("invalid edge_capabilities config")?;

    if cli.check {
        print_tree(&ResourceTree::build(&config));
        return Ok(());
    }

    tracing::info!(
        socket = %config.edge_core_socket_path.display(),
        "Connecting to edge-core"
    );
    let (client, requests) =
        EdgeClient::connect(&config.edge_core_socket_path, &config.edge_core_api_path)
            .await
            .context("could not connect to edge-core")?;
    let client = Arc::new(client);

    let manager = ResourceManager::new(config, client.clone())?;

    tokio::select! {
        result = manager.run(requests) => result.context("resource manager stopped")?,
        () = shutdown_signal() => tracing::info!("Shutdown signal received"),
    }

    if let Err(e) = client.close().await {
        tracing::debug!(error = %e, "Close frame not delivered");
    }
    tracing::info!("edge-resource-manager shutting down");
    Ok(())
}

fn print_tree(tree: &ResourceTree) {
    for instance in tree.instances() {
        println!("{} (instance {})", instance.resource.name, instance.instance_id);
        for entry in &instance.entries {
            println!(
                "  {} {:<6} ops={} value={}",
                entry.registration.address,
                entry.kind.to_string(),
                entry.registration.operations.bits(),
                entry.registration.value
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
