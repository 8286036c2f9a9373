//! Process lifecycle: coordinated shutdown and OS signals.
//!
//! # Data Flow
//! ```text
//! SIGINT / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → every ShutdownSignal resolves
//!     → servers stop accepting, drain in-flight requests, telemetry flushes
//! ```
//!
//! # Design Decisions
//! - One coordinator is shared by every unit of a composition
//! - Late subscribers still observe a trigger that already happened

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{spawn_signal_handler, wait_for_signal};
