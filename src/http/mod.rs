//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     TCP connection
//!     → server.rs (common layers, graceful shutdown)
//!     → request.rs (request ID)
//!     → service router
//!     → problem.rs (unhandled failure → problem details)
//!
//! Outbound:
//!     client.rs (resilience + discovery + telemetry middleware) → reqwest
//! ```

pub mod client;
pub mod problem;
pub mod request;
pub mod server;

pub use client::{build_http_client, HttpClientDefaults};
pub use problem::{log_panic, ProblemDetails, PROBLEM_CONTENT_TYPE};
pub use request::{current_request_id, request_id, X_REQUEST_ID};
pub use server::{with_common_layers, with_common_layers_and_panic_handler, HttpServer};
