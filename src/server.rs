//! HTTP server wiring for the gate.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{middleware, Router};
use tracing::{error, info};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::gate::{rate_limit_gate, GateState, RoutePolicy};
use crate::ratelimit::RateLimitStore;
use crate::upstream::Upstream;

/// HTTP server that fronts the FizikHub application.
///
/// Every route, including the proxy fallback, sits behind the rate limit
/// gate; the gate itself decides which requests interact with the store.
pub struct GateServer {
    /// Address to bind to
    listen_addr: SocketAddr,
    router: Router,
}

impl GateServer {
    /// Assemble the server from configuration and an injected store.
    pub fn new(config: &GateConfig, store: Arc<RateLimitStore>) -> Result<Self> {
        let upstream = Arc::new(Upstream::new(&config.server.upstream_url)?);

        let gate_state = Arc::new(GateState {
            store,
            policy: RoutePolicy::from_config(&config.rate_limiting),
            retry_after_secs: config.rate_limiting.window_secs,
        });

        let router = Router::new()
            .route("/health", get(health))
            .fallback(forward)
            .layer(middleware::from_fn_with_state(gate_state, rate_limit_gate))
            .with_state(upstream);

        Ok(Self {
            listen_addr: config.server.listen_addr,
            router,
        })
    }

    /// Start the server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;

        info!(addr = %self.listen_addr, "Gate listening");

        axum::serve(listener, self.router).await.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            GateError::Io(e)
        })
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server drains in-flight requests once the provided signal
    /// resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;

        info!(addr = %self.listen_addr, "Gate listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                GateError::Io(e)
            })
    }
}

/// Liveness endpoint answered by the gate itself, never the upstream.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Relay an admitted request to the upstream application.
async fn forward(
    State(upstream): State<Arc<Upstream>>,
    request: Request,
) -> Result<axum::response::Response> {
    upstream.forward(request).await
}
