//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all gateway handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Resolve the API for each request and hand it to its dispatcher
//! - Swap the API table when a new configuration arrives

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::observability::{MetricsSink, OutcomeSink};
use crate::proxy::{ProxyBody, ProxyRequest};
use crate::routing::ApiRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub apis: Arc<ArcSwap<ApiRouter>>,
}

/// Inbound HTTP server of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    apis: Arc<ArcSwap<ApiRouter>>,
    sink: Arc<dyn OutcomeSink>,
}

impl HttpServer {
    /// Create a server that reports exchanges to the metrics sink.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_sink(config, Arc::new(MetricsSink))
    }

    /// Create a server reporting exchanges to `sink`.
    pub fn with_sink(config: GatewayConfig, sink: Arc<dyn OutcomeSink>) -> Self {
        let apis = Arc::new(ArcSwap::from_pointee(ApiRouter::from_config(
            &config.apis,
            None,
            sink.clone(),
        )));

        let state = AppState { apis: apis.clone() };
        let router = Self::build_router(state);

        Self {
            router,
            config,
            apis,
            sink,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Every configuration received on `config_updates` replaces the API
    /// table; requests already in flight finish against the old one.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            api_count = self.apis.load().len(),
            "HTTP server starting"
        );

        let apis = self.apis.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let current = apis.load_full();
                let next = ApiRouter::from_config(&new_config.apis, Some(&current), sink.clone());
                tracing::info!(api_count = next.len(), "API table reloaded");
                apis.store(Arc::new(next));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config the server was started with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The live API table.
    pub fn apis(&self) -> Arc<ArcSwap<ApiRouter>> {
        self.apis.clone()
    }
}

/// Catch-all handler: find the API by context path and dispatch.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let apis = state.apis.load_full();

    let path = parts.uri.path();
    let Some((dispatcher, rest)) = apis.resolve(path) else {
        tracing::warn!(path = %path, method = %parts.method, "No API matched");
        return (StatusCode::NOT_FOUND, "No API matches the request path").into_response();
    };

    let target_path = match parts.uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };
    let dispatcher = dispatcher.clone();

    let request = ProxyRequest::new(parts.method, target_path, parts.headers, ProxyBody::from_http(body));
    dispatcher.handle(request).await
}
