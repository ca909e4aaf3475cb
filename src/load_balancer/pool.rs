//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered list of backends
//! - Hand out point-in-time snapshots for health probing
//! - Provide guarded read access for selection and reporting

use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::config::BackendSpec;
use crate::load_balancer::backend::Server;

/// The ordered collection of backends shared by dispatch, health monitoring
/// and reporting.
///
/// The lock guards the list structure only; per-server state is atomic.
/// Membership never changes after construction.
#[derive(Debug)]
pub struct ServerPool {
    servers: RwLock<Vec<Arc<Server>>>,
}

impl ServerPool {
    /// Create a pool from already constructed servers.
    pub fn new(servers: Vec<Arc<Server>>) -> Self {
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Build the pool from validated backend specs, preserving their order.
    pub fn from_specs(specs: Vec<BackendSpec>) -> Self {
        let servers = specs
            .into_iter()
            .map(|spec| {
                tracing::info!(address = %spec.address, weight = spec.weight.get(), "Added backend");
                Arc::new(Server::new(spec.address, spec.weight))
            })
            .collect();
        Self::new(servers)
    }

    /// Read access to the live list. Do not hold across an `.await`.
    pub fn all(&self) -> RwLockReadGuard<'_, Vec<Arc<Server>>> {
        // The list is never written after construction, so a poisoned lock
        // still holds valid data.
        self.servers.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the server handles, for iteration without holding the lock.
    pub fn snapshot(&self) -> Vec<Arc<Server>> {
        self.all().clone()
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.all().iter().filter(|s| s.is_healthy()).count()
    }
}
