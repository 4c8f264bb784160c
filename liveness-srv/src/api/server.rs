//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::response::Response;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info, info_span};

use crate::api::routes;
use crate::error::{Error, Result};
use crate::service::LivenessService;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            cors_origin: None,
            body_limit: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl ApiServerConfig {
    /// Reads `API_BIND_ADDRESS`, `PORT` or `API_PORT` (`API_PORT` wins when both are
    /// set) and `CLIENT_URL` (allowed CORS origin, `*` for any).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = get("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        for key in ["PORT", "API_PORT"] {
            if let Some(port) = get(key)
                && let Ok(parsed) = port.trim().parse::<u16>()
            {
                config.port = parsed;
            }
        }

        if let Some(origin) = get("CLIENT_URL")
            && !origin.trim().is_empty()
            && origin.trim() != "*"
        {
            config.cors_origin = Some(origin.trim().to_string());
        }

        config
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| {
                Error::config(format!(
                    "Invalid bind address `{}:{}`: {}",
                    self.bind_address, self.port, e
                ))
            })
    }
}

/// Health probes are polled often and carry nothing worth tracing.
fn is_quiet(path: &str) -> bool {
    path.starts_with("/api/health")
}

fn request_span(req: &Request) -> Span {
    let path = req.uri().path();
    if is_quiet(path) {
        return Span::none();
    }
    info_span!("request", method = %req.method(), path = %path)
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub liveness_service: Arc<LivenessService>,
    /// Cancelled on shutdown; every in-flight stream runs under a child token
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(liveness_service: Arc<LivenessService>) -> Self {
        Self {
            start_time: Instant::now(),
            liveness_service,
            shutdown_token: CancellationToken::new(),
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        let cancel_token = state.shutdown_token.clone();
        Self {
            config,
            state,
            cancel_token,
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn cors_layer(&self) -> Result<CorsLayer> {
        let Some(origin) = &self.config.cors_origin else {
            return Ok(CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any));
        };

        let origin = HeaderValue::from_str(origin)
            .map_err(|e| Error::config(format!("Invalid CLIENT_URL `{}`: {}", origin, e)))?;

        // Credentials rule out wildcards, so methods and headers are listed.
        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::ORIGIN,
                header::CONTENT_TYPE,
                header::ACCEPT,
                HeaderName::from_static("x-requested-with"),
            ]))
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Result<Router> {
        let router = routes::create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.body_limit))
            .layer(self.cors_layer()?);

        let router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(())
                .on_response(|res: &Response, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    info!(
                        parent: span,
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "Request finished"
                    );
                })
                .on_failure(
                    |class: ServerErrorsFailureClass, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        error!(
                            parent: span,
                            %class,
                            latency_ms = latency.as_millis() as u64,
                            "Request failed"
                        );
                    },
                ),
        );
        Ok(router)
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.socket_addr()?;

        let router = self.build_router()?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }
}
