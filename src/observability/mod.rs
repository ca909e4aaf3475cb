//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!
//! Pool state is projected by:
//!     → metrics.rs (aggregate health + plain-text backend report)
//! ```
//!
//! # Design Decisions
//! - Reporting is read-only; it never mutates pool or server state
//! - Request ID flows through all log events on the request path

pub mod logging;
pub mod metrics;

pub use metrics::{BackendMetrics, MetricsReporter, MetricsSnapshot, PoolHealth};
