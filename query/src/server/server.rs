//! HTTP server for the query service.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

use super::config::QueryServerConfig;
use super::handlers::{
    AppState, handle_healthy, handle_metric_names, handle_metrics, handle_query,
    handle_query_post, handle_query_range, handle_query_range_post, handle_ready,
};
use super::metrics::Metrics;
use super::middleware::{MetricsLayer, TracingLayer};
use crate::service::QueryService;

/// Builds the router with every route, the shared state and the middleware.
pub fn build_router(service: QueryService, metrics: Arc<Metrics>) -> Router {
    let state = AppState {
        service,
        metrics: metrics.clone(),
    };

    Router::new()
        .route("/api/query", get(handle_query).post(handle_query_post))
        .route(
            "/api/query_range",
            get(handle_query_range).post(handle_query_range_post),
        )
        .route("/api/metrics", get(handle_metric_names))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(metrics))
        .with_state(state)
}

/// HTTP server exposing a [`QueryService`].
pub struct QueryServer {
    service: QueryService,
    config: QueryServerConfig,
}

impl QueryServer {
    pub fn new(service: QueryService, config: QueryServerConfig) -> Self {
        Self { service, config }
    }

    /// Binds the configured port and serves until the process is stopped.
    pub async fn run(self) -> anyhow::Result<()> {
        let app = build_router(self.service, Arc::new(Metrics::new()));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "query server listening");

        axum::serve(listener, app).await?;
        Ok(())
    }
}
