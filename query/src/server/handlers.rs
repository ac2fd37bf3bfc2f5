//! HTTP route handlers for the query server.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Query, State};

use super::metrics::{Endpoint, Metrics};
use super::request::{QueryParams, QueryRangeParams};
use crate::service::{QueryService, RenderedResponse};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: QueryService,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    async fn query(&self, params: QueryParams) -> RenderedResponse {
        let response = self.service.query(&params.expr, params.format()).await;
        self.metrics
            .record_query(Endpoint::Query, response.is_success());
        response
    }

    async fn query_range(&self, params: QueryRangeParams) -> RenderedResponse {
        let response = self
            .service
            .query_range(&params.expr, params.range_params())
            .await;
        self.metrics
            .record_query(Endpoint::QueryRange, response.is_success());
        response
    }
}

/// Handle GET /api/query
pub async fn handle_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> RenderedResponse {
    state.query(params).await
}

/// Handle POST /api/query
pub async fn handle_query_post(
    State(state): State<AppState>,
    Form(params): Form<QueryParams>,
) -> RenderedResponse {
    state.query(params).await
}

/// Handle GET /api/query_range
pub async fn handle_query_range(
    State(state): State<AppState>,
    Query(params): Query<QueryRangeParams>,
) -> RenderedResponse {
    state.query_range(params).await
}

/// Handle POST /api/query_range
pub async fn handle_query_range_post(
    State(state): State<AppState>,
    Form(params): Form<QueryRangeParams>,
) -> RenderedResponse {
    state.query_range(params).await
}

/// Handle GET /api/metrics
pub async fn handle_metric_names(State(state): State<AppState>) -> RenderedResponse {
    let response = state.service.metric_names().await;
    state
        .metrics
        .record_query(Endpoint::Metrics, response.is_success());
    response
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> &'static str {
    "OK"
}

/// Handle GET /-/ready
pub async fn handle_ready() -> &'static str {
    "OK"
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}
