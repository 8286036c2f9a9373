//! Running a validated topology in-process.
//!
//! # Responsibilities
//! - Bind a listener per unit and hand it to the unit's launcher
//! - Inject references as discovery entries of the referencing unit
//! - Hold back waiting units until their dependencies probe healthy
//! - Stop everything when shutdown fires or a unit exits

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};

use crate::apphost::topology::{DistributedApplication, ProjectResource};
use crate::apphost::HostError;
use crate::config::{apply_env_overrides, Environment, ServiceConfig};
use crate::health::{HttpProbe, ProbeOutcome};
use crate::lifecycle::{Shutdown, ShutdownSignal};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Time given to units to drain once shutdown fires.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a unit needs to start serving.
pub struct LaunchContext {
    pub name: String,
    pub listener: TcpListener,
    pub config: ServiceConfig,
    pub shutdown: ShutdownSignal,
}

/// Starts one unit. The returned future runs until the unit stops.
#[async_trait]
pub trait ProjectLauncher: Send + Sync {
    async fn launch(&self, ctx: LaunchContext) -> Result<(), BoxError>;
}

type UnitResult = (String, Result<(), BoxError>);

/// Units started by [`DistributedApplication::start`].
pub struct RunningApplication {
    application_name: String,
    addresses: BTreeMap<String, SocketAddr>,
    units: JoinSet<UnitResult>,
    shutdown: Shutdown,
}

impl DistributedApplication {
    /// Start every unit, then wait for shutdown or the first unit to exit.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), HostError> {
        self.start(shutdown).await?.wait().await
    }

    /// Start every unit in dependency order.
    ///
    /// On failure the units already started are stopped before the error
    /// is returned.
    pub async fn start(self, shutdown: Shutdown) -> Result<RunningApplication, HostError> {
        let mut running = RunningApplication {
            application_name: self.application_name.clone(),
            addresses: BTreeMap::new(),
            units: JoinSet::new(),
            shutdown,
        };

        tracing::info!(
            application = %self.application_name,
            environment = %self.environment.as_str(),
            units = self.resources.len(),
            "Starting application"
        );

        for resource in &self.resources {
            if let Err(e) = self.start_unit(resource, &mut running).await {
                tracing::error!(unit = %resource.name, error = %e, "Startup failed, stopping started units");
                running.stop().await;
                return Err(e);
            }
        }

        tracing::info!(application = %self.application_name, "Application started");
        Ok(running)
    }

    async fn start_unit(
        &self,
        resource: &ProjectResource,
        running: &mut RunningApplication,
    ) -> Result<(), HostError> {
        for dependency in &resource.waits_for {
            self.wait_healthy(&resource.name, dependency, running).await?;
        }

        let host = if resource.external_endpoints {
            Ipv4Addr::UNSPECIFIED
        } else {
            Ipv4Addr::LOCALHOST
        };
        let listener = TcpListener::bind((host, resource.port.unwrap_or(0)))
            .await
            .map_err(|source| HostError::Bind {
                resource: resource.name.clone(),
                source,
            })?;
        let local = listener.local_addr().map_err(|source| HostError::Bind {
            resource: resource.name.clone(),
            source,
        })?;
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, local.port()));

        let config = self.unit_config(resource, &running.addresses);
        let ctx = LaunchContext {
            name: resource.name.clone(),
            listener,
            config,
            shutdown: running.shutdown.subscribe(),
        };

        let launcher = Arc::clone(&resource.launcher);
        let name = resource.name.clone();
        running
            .units
            .spawn(async move { (name, launcher.launch(ctx).await) });
        running.addresses.insert(resource.name.clone(), addr);

        tracing::info!(unit = %resource.name, address = %local, "Unit started");
        Ok(())
    }

    fn unit_config(
        &self,
        resource: &ProjectResource,
        addresses: &BTreeMap<String, SocketAddr>,
    ) -> ServiceConfig {
        let mut config = ServiceConfig::named(resource.name.clone());
        apply_env_overrides(&mut config, std::env::vars());
        config.service_name = resource.name.clone();
        config.environment = self.environment.clone();

        for reference in &resource.references {
            if let Some(addr) = addresses.get(reference) {
                config.add_service_endpoint(reference, "http", format!("http://{addr}"));
            }
        }
        config
    }

    async fn wait_healthy(
        &self,
        waiter: &str,
        dependency: &str,
        running: &mut RunningApplication,
    ) -> Result<(), HostError> {
        let Some(addr) = running.addresses.get(dependency).copied() else {
            return Err(HostError::UnresolvedReference {
                resource: waiter.to_string(),
                reference: dependency.to_string(),
            });
        };
        let path = self
            .resource(dependency)
            .and_then(|r| r.health_check_path.clone());

        let Some(path) = path else {
            return Ok(());
        };
        // Probes are only mapped in Development.
        if !probes_mapped(&self.environment) {
            tracing::debug!(unit = %dependency, "Health endpoints not mapped, not waiting");
            return Ok(());
        }

        tracing::info!(unit = %waiter, waiting_for = %dependency, "Waiting for dependency");
        let check = HttpProbe::new(path);
        let outcome = tokio::select! {
            outcome = check.wait_until_healthy(addr, self.startup_timeout) => outcome,
            // A unit that exits during the wait aborts startup.
            Some(joined) = running.units.join_next() => return Err(unit_exit_error(joined)),
        };
        match outcome {
            ProbeOutcome::Healthy { attempts } => {
                tracing::info!(unit = %dependency, attempts, "Dependency healthy");
                Ok(())
            }
            ProbeOutcome::TimedOut { attempts } => Err(HostError::Unhealthy {
                resource: dependency.to_string(),
                attempts,
            }),
        }
    }
}

fn probes_mapped(environment: &Environment) -> bool {
    environment.is_development()
}

fn unit_exit_error(joined: Result<UnitResult, JoinError>) -> HostError {
    match joined {
        Ok((name, Ok(()))) => {
            tracing::warn!(unit = %name, "Unit stopped on its own");
            HostError::Exited { resource: name }
        }
        Ok((name, Err(source))) => {
            tracing::error!(unit = %name, error = %source, "Unit failed");
            HostError::Launch {
                resource: name,
                source,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Unit task aborted");
            HostError::Exited {
                resource: "unknown".to_string(),
            }
        }
    }
}

impl RunningApplication {
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Loopback address of a started unit.
    pub fn address(&self, name: &str) -> Option<SocketAddr> {
        self.addresses.get(name).copied()
    }

    pub fn addresses(&self) -> &BTreeMap<String, SocketAddr> {
        &self.addresses
    }

    /// Wait for shutdown or the first unit to exit, then stop the rest.
    pub async fn wait(mut self) -> Result<(), HostError> {
        let signal = self.shutdown.subscribe();
        let exited = tokio::select! {
            _ = signal.recv() => None,
            Some(joined) = self.units.join_next() => Some(joined),
        };

        let result = match exited {
            None => Ok(()),
            Some(joined) => Err(unit_exit_error(joined)),
        };

        self.stop().await;
        result
    }

    /// Trigger shutdown and wait for every unit to drain.
    pub async fn stop(&mut self) {
        self.shutdown.trigger();

        let drain = async {
            while let Some(joined) = self.units.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => tracing::info!(unit = %name, "Unit stopped"),
                    Ok((name, Err(e))) => {
                        tracing::warn!(unit = %name, error = %e, "Unit stopped with error")
                    }
                    Err(e) => tracing::warn!(error = %e, "Unit task aborted"),
                }
            }
        };

        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(
                remaining = self.units.len(),
                "Units did not drain in time, aborting"
            );
            self.units.abort_all();
        }
        tracing::info!(application = %self.application_name, "Application stopped");
    }
}
