//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Intercept the reserved endpoints (`/health`, `/healthz`, `/metrics`)
//! - Wire up middleware (tracing, request ID)
//! - Dispatch every other request to the backend pool
//! - Run the health monitor alongside the listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_backends, ConfigError, ProxyConfig};
use crate::health::HealthMonitor;
use crate::http::dispatch::Dispatcher;
use crate::http::forward::{Forwarder, HyperForwarder};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{ServerPool, WeightedLeastConnections};
use crate::observability::MetricsReporter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub reporter: MetricsReporter,
}

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Build the server from configuration. Fails before any server is
    /// constructed if the backend list is invalid.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let specs = validate_backends(&config.backends)?;
        let pool = Arc::new(ServerPool::from_specs(specs));
        let forwarder = Arc::new(HyperForwarder::new(Duration::from_secs(
            config.timeouts.request_secs,
        )));
        Ok(Self::with_forwarder(config, pool, forwarder))
    }

    /// Build the server around an existing pool and forwarder.
    pub fn with_forwarder(
        config: ProxyConfig,
        pool: Arc<ServerPool>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            pool.clone(),
            Arc::new(WeightedLeastConnections::new()),
            forwarder,
        ));
        let state = AppState {
            dispatcher,
            reporter: MetricsReporter::new(pool.clone()),
        };

        Self {
            router: Self::build_router(state),
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", any(health_handler))
            .route("/healthz", any(health_handler))
            .route("/metrics", any(metrics_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// The configured router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        let monitor = if self.config.health_check.enabled {
            let monitor = HealthMonitor::from_config(self.pool.clone(), &self.config.health_check);
            Some(tokio::spawn(monitor.run(shutdown.subscribe())))
        } else {
            tracing::info!("Active health checks disabled");
            None
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await;

        // The monitor must not outlive the listener, however serving ended.
        if let Err(e) = &served {
            tracing::error!(error = %e, "HTTP server failed");
            shutdown.trigger();
        }
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }

        tracing::info!("HTTP server stopped");
        served
    }
}

/// Aggregate health: 200 while any backend is healthy.
async fn health_handler(State(state): State<AppState>) -> Response {
    let health = state.reporter.health();
    if health.is_available() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY: No healthy backends").into_response()
    }
}

/// Plain-text per-backend report.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let report = state.reporter.snapshot().to_string();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        report,
    )
        .into_response()
}

/// Every non-reserved request goes to a backend.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.dispatcher.dispatch(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::num::NonZeroU32;
    use tower::ServiceExt;
    use url::Url;

    use crate::http::forward::ForwardError;
    use crate::load_balancer::Server;

    struct EchoForwarder;

    #[async_trait]
    impl Forwarder for EchoForwarder {
        async fn forward(
            &self,
            request: Request<Body>,
            target: &Url,
        ) -> Result<Response<Body>, ForwardError> {
            let id = request
                .headers()
                .get("x-request-id")
                .map(|v| v.to_str().unwrap().to_string())
                .unwrap_or_default();
            Ok(Response::new(Body::from(format!(
                "{} {} {}",
                target.port().unwrap_or_default(),
                request.uri().path(),
                id
            ))))
        }
    }

    fn server(weights: &[u32]) -> HttpServer {
        let servers = weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                Arc::new(Server::new(
                    Url::parse(&format!("http://127.0.0.1:{}", 9101 + i)).unwrap(),
                    NonZeroU32::new(*w).unwrap(),
                ))
            })
            .collect();
        HttpServer::with_forwarder(
            ProxyConfig::default(),
            Arc::new(ServerPool::new(servers)),
            Arc::new(EchoForwarder),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = server(&[1, 1]);
        for path in ["/health", "/healthz"] {
            let response = server.router().oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "OK");
        }

        for s in server.pool().snapshot() {
            s.mark_failure();
        }
        let response = server.router().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_string(response).await, "UNHEALTHY: No healthy backends");
    }

    #[tokio::test]
    async fn test_reserved_paths_are_not_forwarded() {
        let server = server(&[1]);
        let response = server
            .router()
            .oneshot(Request::post("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.pool().snapshot()[0].total_requests(), 0);
    }

    #[tokio::test]
    async fn test_metrics_report() {
        let server = server(&[5, 1]);
        let response = server.router().oneshot(get("/anything")).await.unwrap();
        body_string(response).await;

        let response = server.router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let text = body_string(response).await;
        assert!(text.contains("Total Requests: 1\nBackend Servers: 2\n"));
        assert!(text.contains("[1] 127.0.0.1:9101\n"));
        assert!(text.contains("[2] 127.0.0.1:9102\n"));
    }

    #[tokio::test]
    async fn test_proxy_assigns_request_id() {
        let server = server(&[1]);
        let response = server.router().oneshot(get("/api/items")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed_id = response.headers()["x-request-id"].to_str().unwrap().to_string();

        let body = body_string(response).await;
        assert_eq!(body, format!("9101 /api/items {}", echoed_id));
        assert!(uuid::Uuid::parse_str(&echoed_id).is_ok());
    }

    #[tokio::test]
    async fn test_client_request_id_is_kept() {
        let server = server(&[1]);
        let request = Request::builder()
            .uri("/")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "client-chosen");
        assert_eq!(body_string(response).await, "9101 / client-chosen");
    }

    #[tokio::test]
    async fn test_run_returns_after_monitor_exits() {
        let server = server(&[1]);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(server.run(listener, shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Listener and health monitor each hold a subscription.
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_all_unhealthy_is_service_unavailable() {
        let server = server(&[5, 1, 1]);
        for s in server.pool().snapshot() {
            s.mark_failure();
        }
        let response = server.router().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        for s in server.pool().snapshot() {
            assert_eq!(s.total_requests(), 0);
            assert_eq!(s.active_connections(), 0);
        }
    }
}
