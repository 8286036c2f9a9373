//! Logical service name resolution.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use thiserror::Error;
use url::Url;

use crate::config::ServiceConfig;

/// Separator of a scheme preference list such as `https+http`.
pub const SCHEME_SEPARATOR: char = '+';

/// Errors raised while resolving a logical address.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("service '{service}' is not registered")]
    Unresolved { service: String },

    #[error("service '{service}' has no endpoint for scheme(s) {schemes}")]
    NoEndpoint { service: String, schemes: String },

    #[error("invalid endpoint '{endpoint}' for service '{service}': {source}")]
    InvalidEndpoint {
        service: String,
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

/// Maps logical service names to concrete endpoints.
pub trait ServiceResolver: Send + Sync {
    /// Whether the service is known at all.
    fn contains(&self, service: &str) -> bool;

    /// Pick one endpoint of `service` for `scheme`.
    fn select(&self, service: &str, scheme: &str) -> Option<Url>;

    /// Rewrite a request URL whose host may be a logical service name.
    ///
    /// The scheme may list preferences (`https+http`); the first scheme with
    /// an endpoint wins. Hosts that are not registered pass through unchanged
    /// unless the scheme is a preference list, which only makes sense for
    /// logical names.
    fn resolve_url(&self, url: &Url) -> Result<Url, DiscoveryError> {
        let scheme = url.scheme();
        let preference_list = scheme.contains(SCHEME_SEPARATOR);
        let service = url.host_str().unwrap_or_default();

        if !self.contains(service) {
            if preference_list {
                return Err(DiscoveryError::Unresolved {
                    service: service.to_string(),
                });
            }
            return Ok(url.clone());
        }

        let endpoint = scheme
            .split(SCHEME_SEPARATOR)
            .find_map(|candidate| self.select(service, candidate))
            .ok_or_else(|| DiscoveryError::NoEndpoint {
                service: service.to_string(),
                schemes: scheme.to_string(),
            })?;

        Ok(rebase(&endpoint, url))
    }
}

/// Graft the path, query and fragment of `logical` onto `endpoint`.
fn rebase(endpoint: &Url, logical: &Url) -> Url {
    let mut resolved = endpoint.clone();
    let base = endpoint.path().trim_end_matches('/');
    let path = logical.path();
    if base.is_empty() {
        resolved.set_path(path);
    } else {
        resolved.set_path(&format!("{base}{path}"));
    }
    resolved.set_query(logical.query());
    resolved.set_fragment(logical.fragment());
    resolved
}

type EndpointTable = BTreeMap<String, BTreeMap<String, Vec<Url>>>;

/// Configuration-backed resolver with round-robin selection.
///
/// Service names are matched case-insensitively. The table can be swapped
/// atomically while requests are in flight.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    table: ArcSwap<EndpointTable>,
    counters: DashMap<String, AtomicUsize>,
    allowed_schemes: Vec<String>,
}

impl ServiceRegistry {
    /// Empty registry. An empty `allowed_schemes` allows every scheme.
    pub fn new(allowed_schemes: Vec<String>) -> Self {
        Self {
            table: ArcSwap::from_pointee(EndpointTable::new()),
            counters: DashMap::new(),
            allowed_schemes: allowed_schemes
                .into_iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Build from the `services` section of a service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, DiscoveryError> {
        let registry = Self::new(config.http_client.discovery.allowed_schemes.clone());
        for (service, schemes) in &config.services {
            for (scheme, endpoints) in schemes {
                let parsed = endpoints
                    .iter()
                    .map(|e| {
                        Url::parse(e).map_err(|source| DiscoveryError::InvalidEndpoint {
                            service: service.clone(),
                            endpoint: e.clone(),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                registry.set_endpoints(service, scheme, parsed);
            }
        }
        Ok(registry)
    }

    /// Replace the endpoints of one service and scheme.
    pub fn set_endpoints(&self, service: &str, scheme: &str, endpoints: Vec<Url>) {
        let service = service.to_ascii_lowercase();
        let scheme = scheme.to_ascii_lowercase();
        self.table.rcu(|current| {
            let mut next = EndpointTable::clone(current);
            next.entry(service.clone())
                .or_default()
                .insert(scheme.clone(), endpoints.clone());
            next
        });
        tracing::debug!(service = %service, scheme = %scheme, "Service endpoints updated");
    }

    /// Endpoints registered for a service and scheme.
    pub fn endpoints(&self, service: &str, scheme: &str) -> Vec<Url> {
        self.table
            .load()
            .get(&service.to_ascii_lowercase())
            .and_then(|schemes| schemes.get(&scheme.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_default()
    }

    fn scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes.is_empty() || self.allowed_schemes.iter().any(|s| s == scheme)
    }
}

impl ServiceResolver for ServiceRegistry {
    fn contains(&self, service: &str) -> bool {
        self.table.load().contains_key(&service.to_ascii_lowercase())
    }

    fn select(&self, service: &str, scheme: &str) -> Option<Url> {
        let scheme = scheme.to_ascii_lowercase();
        if !self.scheme_allowed(&scheme) {
            return None;
        }

        let endpoints = self.endpoints(service, &scheme);
        if endpoints.is_empty() {
            return None;
        }

        let key = format!("{}/{}", service.to_ascii_lowercase(), scheme);
        let start = self
            .counters
            .entry(key)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        endpoints.get(start % endpoints.len()).cloned()
    }
}
