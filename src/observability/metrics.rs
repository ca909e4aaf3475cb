//! Pool metrics and aggregate health.
//!
//! # Responsibilities
//! - Aggregate health: available while at least one backend is healthy
//! - Per-backend report: weight, health, connections, requests, failures,
//!   last check time and current ratio
//!
//! # Design Decisions
//! - Pool-wide total is the sum of per-backend totals at read time, so the
//!   two can never disagree

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::load_balancer::ServerPool;

/// Healthy vs total backend count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHealth {
    pub healthy: usize,
    pub total: usize,
}

impl PoolHealth {
    pub fn is_available(&self) -> bool {
        self.healthy > 0
    }
}

/// Point-in-time view of one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendMetrics {
    pub address: String,
    pub healthy: bool,
    pub weight: u32,
    pub active_connections: usize,
    pub total_requests: u64,
    pub consecutive_failures: u32,
    pub last_check: DateTime<Utc>,
    /// `None` while unhealthy.
    pub ratio: Option<f64>,
}

/// Point-in-time view of the whole pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub backends: Vec<BackendMetrics>,
}

/// Read-only projections over the server pool.
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    pool: Arc<ServerPool>,
}

impl MetricsReporter {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self { pool }
    }

    pub fn health(&self) -> PoolHealth {
        let servers = self.pool.all();
        PoolHealth {
            healthy: servers.iter().filter(|s| s.is_healthy()).count(),
            total: servers.len(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let backends: Vec<BackendMetrics> = self
            .pool
            .all()
            .iter()
            .map(|s| BackendMetrics {
                address: s.authority(),
                healthy: s.is_healthy(),
                weight: s.weight(),
                active_connections: s.active_connections(),
                total_requests: s.total_requests(),
                consecutive_failures: s.consecutive_failures(),
                last_check: s.last_check(),
                ratio: s.load_ratio(),
            })
            .collect();

        MetricsSnapshot {
            total_requests: backends.iter().map(|b| b.total_requests).sum(),
            backends,
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Load Balancer Metrics")?;
        writeln!(f)?;
        writeln!(f, "## Overall")?;
        writeln!(f, "Total Requests: {}", self.total_requests)?;
        writeln!(f, "Backend Servers: {}", self.backends.len())?;
        writeln!(f)?;
        writeln!(f, "## Backend Servers")?;
        for (i, b) in self.backends.iter().enumerate() {
            writeln!(f, "[{}] {}", i + 1, b.address)?;
            writeln!(f, "  Status: {}", if b.healthy { "HEALTHY" } else { "UNHEALTHY" })?;
            writeln!(f, "  Weight: {}", b.weight)?;
            writeln!(f, "  Active Connections: {}", b.active_connections)?;
            writeln!(f, "  Total Requests: {}", b.total_requests)?;
            writeln!(f, "  Failure Count: {}", b.consecutive_failures)?;
            writeln!(
                f,
                "  Last Check: {}",
                b.last_check.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
            match b.ratio {
                Some(ratio) => writeln!(f, "  Ratio: {:.2}", ratio)?,
                None => writeln!(f, "  Ratio: inf")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
