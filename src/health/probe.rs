//! Health probe transport.
//!
//! # Responsibilities
//! - Issue one bounded-timeout GET against a backend's health path
//! - Report the status code, or why no status was obtained
//!
//! Interpreting the status (success vs failure) is the monitor's job.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;
use url::Url;

/// Why a probe did not count as healthy. Never leaves the health monitor.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build health check request: {0}")]
    Request(String),

    #[error("connection error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("non-success status {0}")]
    Status(StatusCode),
}

/// Out-of-band health request against one backend.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe `target`, returning whatever status the backend answered with.
    async fn probe(&self, target: &Url) -> Result<StatusCode, ProbeError>;
}

/// HTTP prober: `GET <target><path>` with a deadline.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, target: &Url) -> Result<StatusCode, ProbeError> {
        let url = target
            .join(&self.path)
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "wlc-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(e)) => Err(ProbeError::Transport(e)),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}
