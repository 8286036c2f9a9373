//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (registry.rs):
//!     Startup → add named checks with tags ("live" marks liveness checks)
//!
//! Probe routes (endpoints.rs):
//!     GET /health → every check        → 200 Healthy/Degraded, 503 Unhealthy
//!     GET /alive  → checks tagged live → same mapping
//!
//! Active probing (probe.rs):
//!     App host → poll a unit's health path → start dependents once healthy
//! ```
//!
//! # Design Decisions
//! - Checks run concurrently; the worst status wins
//! - Probe responses are never cached
//! - The default "self" check only proves the process is alive

pub mod endpoints;
pub mod probe;
pub mod registry;

pub use endpoints::{probe_routes, ALIVENESS_ENDPOINT_PATH, HEALTH_ENDPOINT_PATH};
pub use probe::{HttpProbe, ProbeOutcome};
pub use registry::{
    HealthCheck, HealthCheckRegistry, HealthCheckResult, HealthReport, HealthStatus, LIVE_TAG,
};
