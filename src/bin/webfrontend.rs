//! Standalone web frontend.
//!
//! The API is found through `services__apiservice__<scheme>__<n>` entries
//! in the environment or the `services` table of the config file.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use family_copilot::apphost::BoxError;
use family_copilot::config::resolve_config;
use family_copilot::lifecycle::{spawn_signal_handler, Shutdown};
use family_copilot::observability::shutdown_telemetry;
use family_copilot::web;

#[derive(Parser)]
#[command(name = "webfrontend")]
#[command(about = "Renders forecasts fetched from the API", long_about = None)]
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

    let mut config = resolve_config(cli.config.as_deref(), web::SERVICE_NAME)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(environment) = &cli.environment {
        config.environment = environment.parse()?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    web::serve(listener, config, shutdown.subscribe()).await?;

    signals.abort();
    shutdown_telemetry();
    Ok(())
}
