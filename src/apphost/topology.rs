//! Declarative topology of the composed units.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::apphost::host::ProjectLauncher;
use crate::apphost::HostError;
use crate::config::Environment;

/// Declared unit.
#[derive(Clone)]
pub struct ProjectResource {
    pub name: String,
    pub launcher: Arc<dyn ProjectLauncher>,
    pub health_check_path: Option<String>,
    pub external_endpoints: bool,
    pub port: Option<u16>,
    pub references: Vec<String>,
    pub waits_for: Vec<String>,
}

impl std::fmt::Debug for ProjectResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectResource")
            .field("name", &self.name)
            .field("health_check_path", &self.health_check_path)
            .field("external_endpoints", &self.external_endpoints)
            .field("port", &self.port)
            .field("references", &self.references)
            .field("waits_for", &self.waits_for)
            .finish()
    }
}

/// Name of a declared unit, used to reference it from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    /// Handle to a unit by name, whether or not it was declared.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collects the units of an application.
pub struct DistributedApplicationBuilder {
    application_name: String,
    environment: Environment,
    startup_timeout: Duration,
    resources: Vec<ProjectResource>,
}

impl DistributedApplicationBuilder {
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Declare a unit started in-process by `launcher`.
    pub fn add_project<L>(&mut self, name: impl Into<String>, launcher: L) -> ResourceBuilder<'_>
    where
        L: ProjectLauncher + 'static,
    {
        self.resources.push(ProjectResource {
            name: name.into(),
            launcher: Arc::new(launcher),
            health_check_path: None,
            external_endpoints: false,
            port: None,
            references: Vec::new(),
            waits_for: Vec::new(),
        });
        let index = self.resources.len() - 1;
        ResourceBuilder {
            resource: &mut self.resources[index],
        }
    }

    /// Validate the topology and fix the start order.
    ///
    /// Fails on duplicate names, references or waits naming an undeclared
    /// unit, and dependency cycles.
    pub fn build(self) -> Result<DistributedApplication, HostError> {
        let mut names = BTreeSet::new();
        for resource in &self.resources {
            if !names.insert(resource.name.as_str()) {
                return Err(HostError::DuplicateResource(resource.name.clone()));
            }
        }

        for resource in &self.resources {
            for dependency in resource.references.iter().chain(&resource.waits_for) {
                if !names.contains(dependency.as_str()) {
                    return Err(HostError::UnresolvedReference {
                        resource: resource.name.clone(),
                        reference: dependency.clone(),
                    });
                }
            }
        }

        let order = start_order(&self.resources)?;
        tracing::debug!(application = %self.application_name, order = ?order, "Topology validated");

        let mut by_name: BTreeMap<String, ProjectResource> = self
            .resources
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        let resources = order
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect();

        Ok(DistributedApplication {
            application_name: self.application_name,
            environment: self.environment,
            startup_timeout: self.startup_timeout,
            resources,
        })
    }
}

/// Kahn's algorithm over references and waits, ties broken by declaration order.
fn start_order(resources: &[ProjectResource]) -> Result<Vec<String>, HostError> {
    let mut pending: BTreeMap<&str, BTreeSet<&str>> = resources
        .iter()
        .map(|r| {
            let deps = r
                .references
                .iter()
                .chain(&r.waits_for)
                .map(String::as_str)
                .collect();
            (r.name.as_str(), deps)
        })
        .collect();

    let mut order = Vec::with_capacity(resources.len());
    let mut ready: VecDeque<&str> = resources
        .iter()
        .map(|r| r.name.as_str())
        .filter(|name| pending.get(name).is_some_and(BTreeSet::is_empty))
        .collect();

    while let Some(name) = ready.pop_front() {
        pending.remove(name);
        order.push(name.to_string());
        for resource in resources {
            if let Some(deps) = pending.get_mut(resource.name.as_str()) {
                if deps.remove(name) && deps.is_empty() {
                    ready.push_back(resource.name.as_str());
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(order)
    } else {
        let members: Vec<String> = pending.keys().map(|k| k.to_string()).collect();
        Err(HostError::Cycle(members.join(", ")))
    }
}

/// Chained configuration of one declared unit.
pub struct ResourceBuilder<'a> {
    resource: &'a mut ProjectResource,
}

impl ResourceBuilder<'_> {
    /// Probe `path` over HTTP to decide whether the unit is healthy.
    pub fn with_http_health_check(self, path: impl Into<String>) -> Self {
        self.resource.health_check_path = Some(path.into());
        self
    }

    /// Listen on every interface instead of loopback only.
    pub fn with_external_http_endpoints(self) -> Self {
        self.resource.external_endpoints = true;
        self
    }

    /// Fixed port instead of an ephemeral one.
    pub fn with_http_endpoint(self, port: u16) -> Self {
        self.resource.port = Some(port);
        self
    }

    /// Make `other` resolvable by name from this unit.
    pub fn with_reference(self, other: &ResourceHandle) -> Self {
        if !self.resource.references.contains(&other.name) {
            self.resource.references.push(other.name.clone());
        }
        self
    }

    /// Start this unit only once `other` reports healthy.
    pub fn wait_for(self, other: &ResourceHandle) -> Self {
        if !self.resource.waits_for.contains(&other.name) {
            self.resource.waits_for.push(other.name.clone());
        }
        self
    }

    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle::named(self.resource.name.clone())
    }
}

/// Validated application, resources in start order.
pub struct DistributedApplication {
    pub(crate) application_name: String,
    pub(crate) environment: Environment,
    pub(crate) startup_timeout: Duration,
    pub(crate) resources: Vec<ProjectResource>,
}

impl DistributedApplication {
    pub fn builder(application_name: impl Into<String>) -> DistributedApplicationBuilder {
        DistributedApplicationBuilder {
            application_name: application_name.into(),
            environment: Environment::Development,
            startup_timeout: Duration::from_secs(60),
            resources: Vec::new(),
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Resources in the order they will be started.
    pub fn resources(&self) -> &[ProjectResource] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&ProjectResource> {
        self.resources.iter().find(|r| r.name == name)
    }
}
