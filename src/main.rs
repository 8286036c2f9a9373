//! App host: runs the forecast API and the web frontend in one process.
//!
//! ```text
//!     Browser ──▶ webfrontend ──(https+http://apiservice)──▶ apiservice
//!                    │                                          │
//!                    └──────────── OTLP (optional) ◀────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use family_copilot::apphost::{compose, load_apphost_config, AppHostConfig, BoxError};
use family_copilot::config::{Environment, OTLP_ENDPOINT_VAR};
use family_copilot::lifecycle::{spawn_signal_handler, Shutdown};
use family_copilot::observability::{init_telemetry, shutdown_telemetry, TelemetrySettings};

#[derive(Parser)]
#[command(name = "family-copilot")]
#[command(about = "Runs the forecast API and web frontend", long_about = None)]
struct Cli {
    /// App host settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment classification passed to every unit
    #[arg(short, long)]
    environment: Option<String>,

    /// Fixed port for the web frontend
    #[arg(long)]
    webfrontend_port: Option<u16>,

    /// Seconds to wait for a dependency to become healthy
    #[arg(long)]
    startup_timeout_secs: Option<u64>,
}

fn host_config(cli: &Cli) -> Result<AppHostConfig, BoxError> {
    let mut config = match &cli.config {
        Some(path) => load_apphost_config(path)?,
        None => AppHostConfig::default(),
    };

    if let Some(environment) = Environment::from_env() {
        config.environment = environment;
    }
    if let Some(environment) = &cli.environment {
        config.environment = environment.parse()?;
    }
    if let Some(port) = cli.webfrontend_port {
        config.webfrontend_port = Some(port);
    }
    if let Some(secs) = cli.startup_timeout_secs {
        config.startup_timeout_secs = secs;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = host_config(&cli)?;

    init_telemetry(&TelemetrySettings {
        service_name: config.application_name.clone(),
        environment: config.environment.clone(),
        log_level: "info".to_string(),
        otlp_endpoint: std::env::var(OTLP_ENDPOINT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty()),
    })?;

    tracing::info!(
        application = %config.application_name,
        environment = %config.environment,
        startup_timeout_secs = config.startup_timeout_secs,
        "family-copilot v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let app = compose(&config)?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());
    let result = app.run(shutdown).await;
    signals.abort();

    tracing::info!("Shutdown complete");
    shutdown_telemetry();
    Ok(result?)
}
