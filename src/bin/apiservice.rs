//! Standalone forecast API.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use family_copilot::apiservice::{self, ApiState};
use family_copilot::apphost::BoxError;
use family_copilot::config::resolve_config;
use family_copilot::lifecycle::{spawn_signal_handler, Shutdown};
use family_copilot::observability::shutdown_telemetry;

#[derive(Parser)]
#[command(name = "apiservice")]
#[command(about = "Serves random weather forecasts", long_about = None)]
struct Cli {
    /// Service settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the file
    #[arg(short, long)]
    bind: Option<String>,

    /// Environment classification, overrides the file
    #[arg(short, long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref(), apiservice::SERVICE_NAME)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(environment) = &cli.environment {
        config.environment = environment.parse()?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    apiservice::serve(listener, config, ApiState::default(), shutdown.subscribe()).await?;

    signals.abort();
    shutdown_telemetry();
    Ok(())
}
