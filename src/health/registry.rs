//! Health check registrations and evaluation.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::join_all;

/// Tag carried by checks that signal liveness only.
pub const LIVE_TAG: &str = "live";

/// Outcome of a single check or of a whole report.
///
/// Ordered from best to worst so a report takes the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result returned by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub description: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            description: None,
        }
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            description: Some(description.into()),
        }
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            description: Some(description.into()),
        }
    }
}

/// A health check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> HealthCheckResult;
}

/// Adapter turning a synchronous closure into a check.
struct FnCheck<F>(F);

#[async_trait]
impl<F> HealthCheck for FnCheck<F>
where
    F: Fn() -> HealthCheckResult + Send + Sync,
{
    async fn check(&self) -> HealthCheckResult {
        (self.0)()
    }
}

/// A named, tagged check.
#[derive(Clone)]
pub struct HealthCheckRegistration {
    pub name: String,
    pub tags: Vec<String>,
    check: Arc<dyn HealthCheck>,
}

impl HealthCheckRegistration {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl fmt::Debug for HealthCheckRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckRegistration")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Per-check entry of a report.
#[derive(Debug, Clone)]
pub struct HealthReportEntry {
    pub name: String,
    pub result: HealthCheckResult,
    pub duration: Duration,
}

/// Aggregated outcome of the checks selected by a predicate.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub entries: Vec<HealthReportEntry>,
    pub total_duration: Duration,
}

/// The set of checks registered for a service.
#[derive(Debug, Clone, Default)]
pub struct HealthCheckRegistry {
    registrations: Vec<HealthCheckRegistration>,
}

impl HealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check. A name that is already registered is replaced.
    pub fn add_check<C>(&mut self, name: impl Into<String>, check: C, tags: &[&str]) -> &mut Self
    where
        C: HealthCheck + 'static,
    {
        let name = name.into();
        self.registrations.retain(|r| r.name != name);
        self.registrations.push(HealthCheckRegistration {
            name,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            check: Arc::new(check),
        });
        self
    }

    /// Register a synchronous check.
    pub fn add_fn<F>(&mut self, name: impl Into<String>, check: F, tags: &[&str]) -> &mut Self
    where
        F: Fn() -> HealthCheckResult + Send + Sync + 'static,
    {
        self.add_check(name, FnCheck(check), tags)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.iter().any(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn registrations(&self) -> &[HealthCheckRegistration] {
        &self.registrations
    }

    /// Run every check selected by `predicate` concurrently.
    ///
    /// An empty selection is healthy.
    pub async fn evaluate<P>(&self, predicate: P) -> HealthReport
    where
        P: Fn(&HealthCheckRegistration) -> bool,
    {
        let started = Instant::now();
        let selected: Vec<_> = self.registrations.iter().filter(|r| predicate(r)).collect();

        let entries = join_all(selected.into_iter().map(|registration| async move {
            let check_started = Instant::now();
            let result = registration.check.check().await;
            if result.status != HealthStatus::Healthy {
                tracing::warn!(
                    check = %registration.name,
                    status = %result.status,
                    description = result.description.as_deref().unwrap_or(""),
                    "Health check not healthy"
                );
            }
            HealthReportEntry {
                name: registration.name.clone(),
                result,
                duration: check_started.elapsed(),
            }
        }))
        .await;

        let status = entries
            .iter()
            .map(|e| e.result.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        HealthReport {
            status,
            entries,
            total_duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let report = HealthCheckRegistry::new().evaluate(|_| true).await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.entries.is_empty());
    }

    #[tokio::test]
    async fn test_worst_status_wins() {
        let mut registry = HealthCheckRegistry::new();
        registry
            .add_fn("a", HealthCheckResult::healthy, &[LIVE_TAG])
            .add_fn("b", || HealthCheckResult::degraded("slow"), &[])
            .add_fn("c", || HealthCheckResult::unhealthy("down"), &["db"]);

        let all = registry.evaluate(|_| true).await;
        assert_eq!(all.status, HealthStatus::Unhealthy);
        assert_eq!(all.entries.len(), 3);

        let live = registry.evaluate(|r| r.has_tag(LIVE_TAG)).await;
        assert_eq!(live.status, HealthStatus::Healthy);
        assert_eq!(live.entries.len(), 1);

        let degraded = registry.evaluate(|r| r.name != "c").await;
        assert_eq!(degraded.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_same_name_replaces() {
        let mut registry = HealthCheckRegistry::new();
        registry.add_fn("self", HealthCheckResult::healthy, &[LIVE_TAG]);
        registry.add_fn("self", HealthCheckResult::healthy, &[LIVE_TAG]);
        assert_eq!(registry.len(), 1);
    }
}
