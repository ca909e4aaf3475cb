//! Request dispatch.
//!
//! # Responsibilities
//! - Select a backend for each inbound request
//! - Account the request on the backend (active + total counters)
//! - Forward, and release the connection slot once the response is done
//!
//! # Design Decisions
//! - No healthy backend: 503, no counters touched
//! - Forwarding errors become 502/504 and leave health state alone;
//!   only the health monitor decides health
//! - The connection guard rides inside the response body, so a streamed
//!   response counts as active until the client has it all

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use thiserror::Error;

use crate::http::forward::{ForwardError, Forwarder};
use crate::http::request::RequestIdExt;
use crate::load_balancer::{ConnectionGuard, LoadBalancer, Server, ServerPool};

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Why a request could not be served by a backend.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no healthy backend available")]
    NoBackendAvailable,

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        match self {
            DispatchError::NoBackendAvailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable: No healthy backend servers available.",
            )
                .into_response(),
            DispatchError::Forward(ForwardError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout").into_response()
            }
            DispatchError::Forward(_) => (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response(),
        }
    }
}

/// Routes requests to the pool through a selection strategy and a forwarder.
pub struct Dispatcher {
    pool: Arc<ServerPool>,
    balancer: Arc<dyn LoadBalancer>,
    forwarder: Arc<dyn Forwarder>,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<ServerPool>,
        balancer: Arc<dyn LoadBalancer>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            pool,
            balancer,
            forwarder,
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Pick a healthy backend, or `None` if there is none.
    pub fn select(&self) -> Option<Arc<Server>> {
        let servers = self.pool.all();
        self.balancer
            .next_server(&servers)
            .filter(|server| server.is_healthy())
    }

    /// Serve one request on the selected backend.
    pub async fn dispatch(&self, mut request: Request<Body>) -> Result<Response<Body>, DispatchError> {
        let request_id = request.request_id().unwrap_or("unknown").to_string();

        let Some(server) = self.select() else {
            tracing::warn!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                "No healthy backend available"
            );
            return Err(DispatchError::NoBackendAvailable);
        };

        let guard = server.acquire();
        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            target = %guard.authority(),
            active = guard.active_connections(),
            total = guard.total_requests(),
            ratio = guard.load_ratio().unwrap_or(f64::INFINITY),
            "Forwarding request"
        );

        append_forwarded_for(&mut request);

        let result = self.forwarder.forward(request, guard.address()).await;
        match result {
            Ok(response) => Ok(hold_until_complete(response, guard)),
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    target = %guard.authority(),
                    error = %e,
                    "Upstream error"
                );
                Err(DispatchError::Forward(e))
            }
        }
    }
}

/// Move the connection guard into the response body so it drops when the
/// body is fully sent or abandoned.
fn hold_until_complete(response: Response<Body>, guard: ConnectionGuard) -> Response<Body> {
    let (parts, body) = response.into_parts();
    let stream = body.into_data_stream().map(move |chunk| {
        let _held = &guard;
        chunk
    });
    Response::from_parts(parts, Body::from_stream(stream))
}

fn append_forwarded_for(request: &mut Request<Body>) {
    let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>().cloned() else {
        return;
    };
    let client_ip = peer.ip().to_string();
    let value = match request.headers().get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, client_ip),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        request.headers_mut().insert(X_FORWARDED_FOR.clone(), value);
    }
}
