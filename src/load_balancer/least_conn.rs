//! Weighted least connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Server, LoadBalancer};

/// Weighted least connections selector.
/// Selects the healthy backend with the minimum `active_connections / weight`.
#[derive(Debug, Default)]
pub struct WeightedLeastConnections;

impl WeightedLeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for WeightedLeastConnections {
    fn next_server(&self, backends: &[Arc<Server>]) -> Option<Arc<Server>> {
        // Counters are read one server at a time; the result is an
        // approximation under concurrent dispatch, which is fine for balancing.
        let mut best: Option<(&Arc<Server>, f64)> = None;
        for backend in backends {
            let Some(ratio) = backend.load_ratio() else {
                continue;
            };
            // Strictly smaller wins, so ties keep the earlier pool entry.
            match best {
                Some((_, best_ratio)) if ratio >= best_ratio => {}
                _ => best = Some((backend, ratio)),
            }
        }

        match best {
            Some((backend, _)) => Some(backend.clone()),
            // Nothing healthy: hand back the first entry, callers reject it
            // on its health flag.
            None => backends.first().cloned(),
        }
    }
}
