//! Service discovery.
//!
//! # Data Flow
//! ```text
//! Configuration (services.<name>.<scheme> = [endpoints]):
//!     → resolver.rs ServiceRegistry (name → scheme → endpoints)
//!
//! Outbound request to https+http://apiservice/path:
//!     → middleware.rs (resolve host, pick endpoint round-robin)
//!     → http://127.0.0.1:5001/path
//! ```

pub mod middleware;
pub mod resolver;

pub use middleware::ServiceDiscovery;
pub use resolver::{DiscoveryError, ServiceRegistry, ServiceResolver, SCHEME_SEPARATOR};
