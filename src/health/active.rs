//! Active health checking.
//!
//! # Responsibilities
//! - Probe every backend immediately, then on a fixed interval
//! - Update backend health state based on results
//! - Stop when the shutdown signal fires, even mid-pass

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{HealthProbe, HttpProbe, ProbeError};
use crate::load_balancer::{HealthTransition, Server, ServerPool};

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, probe: Arc<dyn HealthProbe>, interval: Duration) -> Self {
        Self {
            pool,
            probe,
            interval,
        }
    }

    /// Monitor probing over HTTP as configured.
    pub fn from_config(pool: Arc<ServerPool>, config: &HealthCheckConfig) -> Self {
        let probe = HttpProbe::new(
            config.path.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        Self::new(pool, Arc::new(probe), Duration::from_secs(config.interval_secs))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        // First tick completes immediately.
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }
            // A pass still waiting on slow probes is abandoned on shutdown.
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = self.check_all() => {}
            }
        }
        tracing::info!("Health monitor stopped");
    }

    /// Probe every backend once. Probes run concurrently; each touches only
    /// its own server's atomics.
    pub async fn check_all(&self) {
        // Snapshot so no lock is held across network I/O.
        let servers = self.pool.snapshot();
        join_all(servers.iter().map(|server| self.check_server(server))).await;
    }

    async fn check_server(&self, server: &Server) {
        server.touch_last_check();

        let outcome = match self.probe.probe(server.address()).await {
            Ok(status) if status.is_success() => Ok(()),
            Ok(status) => Err(ProbeError::Status(status)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                if server.mark_success() == HealthTransition::Recovered {
                    tracing::info!(
                        addr = %server.authority(),
                        "Backend is now HEALTHY"
                    );
                }
            }
            Err(e) => {
                tracing::debug!(addr = %server.authority(), error = %e, "Health check failed");
                if server.mark_failure() == HealthTransition::Failed {
                    tracing::warn!(
                        addr = %server.authority(),
                        error = %e,
                        failures = server.consecutive_failures(),
                        "Backend is now UNHEALTHY"
                    );
                }
            }
        }
    }
}
