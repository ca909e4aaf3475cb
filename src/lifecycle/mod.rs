//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting and drains
//!             → health monitor exits its loop within one tick
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
