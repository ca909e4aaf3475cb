//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (read the fixed backend list)
//!     → least_conn.rs (lowest active_connections / weight among healthy)
//!     → backend.rs (account the request, guard releases on completion)
//! ```
//!
//! # Design Decisions
//! - Selector is stateless; the pool and its servers carry all state
//! - Per-server counters are atomics, the list sits behind a read/write lock
//! - Unhealthy backends stay in the pool but are skipped by selection

use std::sync::Arc;

pub mod backend;
pub mod least_conn;
pub mod pool;

pub use backend::{ConnectionGuard, HealthTransition, Server};
pub use least_conn::WeightedLeastConnections;
pub use pool::ServerPool;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick the next backend, or `None` when `backends` is empty.
    ///
    /// May return an unhealthy backend when no healthy one exists; callers
    /// must check [`Server::is_healthy`] before using it.
    fn next_server(&self, backends: &[Arc<Server>]) -> Option<Arc<Server>>;
}
