//! Composition root.
//!
//! # Data Flow
//! ```text
//! compose(AppHostConfig)
//!     → topology.rs (declare units, validate, order)
//!     → host.rs (bind, inject references, wait for health, launch)
//!     → apiservice / webfrontend running in-process
//! ```
//!
//! # Design Decisions
//! - Topology errors are fatal before anything is bound
//! - Units share the host process and its telemetry pipeline

pub mod host;
pub mod topology;

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apiservice::{self, ApiState};
use crate::config::{ConfigError, Environment};
use crate::health::HEALTH_ENDPOINT_PATH;
use crate::web;

pub use host::{BoxError, LaunchContext, ProjectLauncher, RunningApplication};
pub use topology::{
    DistributedApplication, DistributedApplicationBuilder, ProjectResource, ResourceBuilder,
    ResourceHandle,
};

/// Startup failures of the composition.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("resource '{resource}' references unknown resource '{reference}'")]
    UnresolvedReference { resource: String, reference: String },

    #[error("dependency cycle between: {0}")]
    Cycle(String),

    #[error("failed to bind '{resource}': {source}")]
    Bind {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    #[error("resource '{resource}' did not become healthy after {attempts} probes")]
    Unhealthy { resource: String, attempts: u32 },

    #[error("resource '{resource}' failed: {source}")]
    Launch {
        resource: String,
        #[source]
        source: BoxError,
    },

    #[error("resource '{resource}' exited")]
    Exited { resource: String },
}

/// App host settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppHostConfig {
    pub application_name: String,
    pub environment: Environment,
    pub startup_timeout_secs: u64,
    /// Fixed frontend port, ephemeral when unset.
    pub webfrontend_port: Option<u16>,
}

impl Default for AppHostConfig {
    fn default() -> Self {
        Self {
            application_name: "Family Copilot".to_string(),
            environment: Environment::Development,
            startup_timeout_secs: 60,
            webfrontend_port: None,
        }
    }
}

impl AppHostConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Load app host settings from a TOML file.
pub fn load_apphost_config(path: &Path) -> Result<AppHostConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Runs the forecast API.
pub struct ApiServiceLauncher;

#[async_trait]
impl ProjectLauncher for ApiServiceLauncher {
    async fn launch(&self, ctx: LaunchContext) -> Result<(), BoxError> {
        apiservice::serve(ctx.listener, ctx.config, ApiState::default(), ctx.shutdown).await?;
        Ok(())
    }
}

/// Runs the web frontend.
pub struct WebFrontendLauncher;

#[async_trait]
impl ProjectLauncher for WebFrontendLauncher {
    async fn launch(&self, ctx: LaunchContext) -> Result<(), BoxError> {
        web::serve(ctx.listener, ctx.config, ctx.shutdown).await
    }
}

/// The application topology: the frontend references and waits for the API.
pub fn compose(config: &AppHostConfig) -> Result<DistributedApplication, HostError> {
    let mut builder = DistributedApplication::builder(config.application_name.clone())
        .with_environment(config.environment.clone())
        .with_startup_timeout(config.startup_timeout());

    let api = builder
        .add_project(apiservice::SERVICE_NAME, ApiServiceLauncher)
        .with_http_health_check(HEALTH_ENDPOINT_PATH)
        .handle();

    let frontend = builder
        .add_project(web::SERVICE_NAME, WebFrontendLauncher)
        .with_external_http_endpoints()
        .with_http_health_check(HEALTH_ENDPOINT_PATH)
        .with_reference(&api)
        .wait_for(&api);
    if let Some(port) = config.webfrontend_port {
        frontend.with_http_endpoint(port);
    }

    builder.build()
}
