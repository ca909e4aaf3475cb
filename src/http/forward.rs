//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound request onto the chosen backend
//! - Add forwarding headers (Host, X-Forwarded-By)
//! - Send it with a deadline and hand back the streamed response
//!
//! # Design Decisions
//! - Forwarding failures are gateway errors only; they never touch health
//! - Bodies are streamed in both directions, nothing is buffered

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;
use url::Url;

pub const X_FORWARDED_BY: &str = "x-forwarded-by";
const FORWARDED_BY_VALUE: &str = "wlc-balancer";

/// Errors from delivering a request to a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream target '{0}'")]
    InvalidTarget(String),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

/// Performs the actual transmission of one request to one backend.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        request: Request<Body>,
        target: &Url,
    ) -> Result<Response<Body>, ForwardError>;
}

/// Forwarder over a pooled hyper client.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HyperForwarder {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }
}

#[async_trait]
impl Forwarder for HyperForwarder {
    async fn forward(
        &self,
        request: Request<Body>,
        target: &Url,
    ) -> Result<Response<Body>, ForwardError> {
        let request = rewrite_request(request, target)?;
        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response.map(Body::new)),
            Ok(Err(e)) => Err(ForwardError::Transport(e)),
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        }
    }
}

/// `host[:port]` of a backend URL, as used in the Host header.
fn target_authority(target: &Url) -> Result<String, ForwardError> {
    let host = target
        .host_str()
        .ok_or_else(|| ForwardError::InvalidTarget(target.to_string()))?;
    Ok(match target.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Point the request at `target`, keeping method, path, query, headers and body.
pub fn rewrite_request(request: Request<Body>, target: &Url) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();
    let authority_str = target_authority(target)?;
    let invalid = || ForwardError::InvalidTarget(target.to_string());

    let authority = Authority::from_str(&authority_str).map_err(|_| invalid())?;
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts).map_err(|_| invalid())?;
    // Upstream connections are plain HTTP/1.1 regardless of the client's protocol.
    parts.version = Version::HTTP_11;

    let host = HeaderValue::from_str(&authority_str).map_err(|_| invalid())?;
    parts.headers.insert(header::HOST, host);
    parts
        .headers
        .insert(X_FORWARDED_BY, HeaderValue::from_static(FORWARDED_BY_VALUE));

    Ok(Request::from_parts(parts, body))
}
