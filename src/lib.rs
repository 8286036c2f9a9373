//! Family Copilot: a forecast API and a web frontend composed by an app host.

// Units
pub mod apiservice;
pub mod apphost;
pub mod web;

// Domain
pub mod forecast;

// Shared service defaults
pub mod defaults;
pub mod discovery;
pub mod health;
pub mod observability;
pub mod resilience;

// Plumbing
pub mod config;
pub mod http;
pub mod lifecycle;

pub use apphost::{compose, AppHostConfig, DistributedApplication};
pub use config::ServiceConfig;
pub use defaults::StartupContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
