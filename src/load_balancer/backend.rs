//! Backend server abstraction.
//!
//! # Responsibilities
//! - Represent a single weighted backend server
//! - Track active connections and lifetime request count
//! - Track health state driven by active probes
//! - Expose the weighted load ratio used for selection

use std::num::NonZeroU32;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

/// Outcome of recording a probe result against a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// Health flag did not change.
    Unchanged,
    /// Server was unhealthy and is now eligible again.
    Recovered,
    /// Server was healthy and is now excluded from selection.
    Failed,
}

/// A single backend server.
///
/// Identity (`address`, `weight`) is fixed at construction. Every other field
/// is an independent atomic so that dispatch and health probing never need a
/// lock around the server itself.
#[derive(Debug)]
pub struct Server {
    address: Url,
    weight: NonZeroU32,
    active_connections: AtomicUsize,
    total_requests: AtomicU64,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    /// Unix seconds of the most recent probe attempt.
    last_check: AtomicI64,
}

impl Server {
    /// Create a new backend. Servers start healthy.
    pub fn new(address: Url, weight: NonZeroU32) -> Self {
        Self {
            address,
            weight,
            active_connections: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            last_check: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    /// `host[:port]` form of the address, used in logs and reports. Matches
    /// the Host header sent upstream, so a default port is left out.
    pub fn authority(&self) -> String {
        match (self.address.host_str(), self.address.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => self.address.to_string(),
        }
    }

    pub fn weight(&self) -> u32 {
        self.weight.get()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Time of the most recent probe attempt (creation time before the first probe).
    pub fn last_check(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_check.load(Ordering::Relaxed), 0).unwrap_or_default()
    }

    /// Active connections divided by weight, or `None` while unhealthy.
    ///
    /// An unhealthy server has no ratio at all rather than a huge one; the
    /// selector treats `None` as "only if nothing else is eligible".
    pub fn load_ratio(&self) -> Option<f64> {
        if !self.is_healthy() {
            return None;
        }
        Some(self.active_connections() as f64 / f64::from(self.weight.get()))
    }

    /// Account a dispatched request and return a guard releasing the
    /// connection slot when dropped.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            server: self.clone(),
        }
    }

    fn release(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // --- Health Logic ---

    /// Stamp the time of a probe attempt.
    pub fn touch_last_check(&self) {
        self.last_check.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    /// Record a successful probe: failures reset, server eligible.
    pub fn mark_success(&self) -> HealthTransition {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.healthy.swap(true, Ordering::AcqRel) {
            HealthTransition::Unchanged
        } else {
            HealthTransition::Recovered
        }
    }

    /// Record a failed probe: failures incremented, server excluded.
    pub fn mark_failure(&self) -> HealthTransition {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if self.healthy.swap(false, Ordering::AcqRel) {
            HealthTransition::Failed
        } else {
            HealthTransition::Unchanged
        }
    }
}

/// RAII guard pairing one `active_connections` decrement with the increment
/// done in [`Server::acquire`]. Runs on every exit path, unwinding included.
#[derive(Debug)]
pub struct ConnectionGuard {
    server: Arc<Server>,
}

impl Deref for ConnectionGuard {
    type Target = Server;
    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.server.release();
    }
}
