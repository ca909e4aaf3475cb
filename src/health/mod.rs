//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Immediate first pass, then periodic timer
//!     → Snapshot the pool
//!     → Probe each backend (probe.rs)
//!     → Update the backend's health flag and failure count
//! ```
//!
//! # Design Decisions
//! - Health is driven by probes only; live traffic failures do not flip it
//! - A single failed probe excludes a backend, a single success restores it
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod probe;

pub use active::HealthMonitor;
pub use probe::{HealthProbe, HttpProbe, ProbeError};
