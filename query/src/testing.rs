//! Testing utilities for the query HTTP server.
//!
//! Provides helpers for integration tests that exercise HTTP endpoints
//! using Axum's `oneshot()` infrastructure over in-memory storage.

use std::sync::Arc;

use axum::Router;

use crate::clock::Clock;
use crate::evaluator::MemoryEvaluator;
use crate::model::Series;
use crate::server::{Metrics, build_router};
use crate::service::QueryService;
use crate::storage::{InMemoryStorage, MetricNameStore};

// Re-export production types so integration tests use the real types.
pub use crate::render::{ErrorEnvelope, MatrixSeries, TypedEnvelope, VectorSeries};

/// Create a [`QueryService`] over in-memory storage holding `series`.
pub fn create_test_service(clock: Arc<dyn Clock>, series: Vec<Series>) -> QueryService {
    let storage = Arc::new(InMemoryStorage::new());
    storage.write(series).unwrap();
    QueryService::new(
        Arc::new(MemoryEvaluator::new(storage.clone())),
        storage,
        clock,
    )
}

/// Create a [`QueryService`] whose metric names come from `metric_store`
/// and whose evaluator sees no data.
pub fn create_test_service_with_store(
    clock: Arc<dyn Clock>,
    metric_store: Arc<dyn MetricNameStore>,
) -> QueryService {
    let storage = Arc::new(InMemoryStorage::new());
    QueryService::new(Arc::new(MemoryEvaluator::new(storage)), metric_store, clock)
}

/// Build the production Axum router with the same routes, middleware and state
/// as [`crate::server::QueryServer::run()`] but without binding to a TCP
/// port.
pub fn build_app(service: QueryService) -> Router {
    build_router(service, Arc::new(Metrics::new()))
}
