//! The query service: instant queries, range queries and metric name listing.
//!
//! Every operation is a single request/response and returns a
//! [`RenderedResponse`]; none of them fail at the Rust level.
//!
//! Error rendering is asymmetric. The two query operations
//! render failures as a JSON error envelope with the default status, while
//! metric name listing answers storage and serialization failures with a
//! 500 and the raw error text.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::clock::Clock;
use crate::error::{QueryError, Result};
use crate::evaluator::Evaluator;
use crate::expr::Expression;
use crate::render::{self, ContentType, OutputFormat};
use crate::storage::MetricNameStore;
use crate::window::{RangeParams, TimeWindow};

/// A rendered response body with its content type and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub body: String,
    pub content_type: ContentType,
    pub status: StatusCode,
    /// Set when the body reports a failure, whatever the status.
    pub failed: bool,
}

impl RenderedResponse {
    pub fn ok(body: String, content_type: ContentType) -> Self {
        Self {
            body,
            content_type,
            status: StatusCode::OK,
            failed: false,
        }
    }

    /// A JSON error envelope with the default status.
    pub fn json_error(err: &QueryError) -> Self {
        Self {
            failed: true,
            ..Self::ok(render::error_to_json(err), ContentType::Json)
        }
    }

    pub fn is_success(&self) -> bool {
        !self.failed && self.status.is_success()
    }
}

/// Query-serving façade over an evaluator and a metric name store.
#[derive(Clone)]
pub struct QueryService {
    evaluator: Arc<dyn Evaluator>,
    metric_store: Arc<dyn MetricNameStore>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        metric_store: Arc<dyn MetricNameStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluator,
            metric_store,
            clock,
        }
    }

    /// Evaluates `expr` at the current time and renders it in `format`.
    pub async fn query(&self, expr: &str, format: OutputFormat) -> RenderedResponse {
        let expression = match Expression::parse(expr) {
            Ok(expression) => expression,
            Err(err) => {
                tracing::debug!(query = %expr, error = %err, "failed to parse instant query");
                return RenderedResponse::json_error(&err);
            }
        };

        match self.eval_instant(&expression, format).await {
            Ok(body) => RenderedResponse::ok(body, format.content_type()),
            Err(err) => {
                tracing::debug!(query = %expr, error = %err, "instant query failed");
                RenderedResponse::json_error(&err)
            }
        }
    }

    async fn eval_instant(&self, expression: &Expression, format: OutputFormat) -> Result<String> {
        let timestamp = self.clock.now();
        let value = self.evaluator.eval_instant(expression, timestamp).await?;
        render::value_to_string(&value, format)
    }

    /// Evaluates a vector expression over a normalized window and renders
    /// the sorted matrix as JSON.
    pub async fn query_range(&self, expr: &str, params: RangeParams) -> RenderedResponse {
        match self.eval_range(expr, params).await {
            Ok(body) => RenderedResponse::ok(body, ContentType::Json),
            Err(err) => {
                tracing::debug!(query = %expr, error = %err, "range query failed");
                RenderedResponse::json_error(&err)
            }
        }
    }

    async fn eval_range(&self, expr: &str, params: RangeParams) -> Result<String> {
        let vector = Expression::parse(expr)?.into_vector()?;
        let window = TimeWindow::normalize(params, self.clock.as_ref());
        tracing::debug!(
            start = window.start(),
            end = window.end(),
            step = window.step(),
            "evaluating range query"
        );

        let mut matrix = self
            .evaluator
            .eval_vector_range(
                &vector,
                window.start_time(),
                window.end_time(),
                window.step_duration(),
            )
            .await?;
        matrix.sort();
        render::matrix_to_json(&matrix)
    }

    /// Lists all known metric names as a sorted JSON array.
    pub async fn metric_names(&self) -> RenderedResponse {
        let mut names = match self.metric_store.metric_names().await {
            Ok(names) => names,
            Err(err) => {
                tracing::error!(error = %err, "Error loading metric names");
                return raw_internal_error(&err);
            }
        };
        names.sort();
        names.dedup();

        match serde_json::to_string(&names) {
            Ok(body) => RenderedResponse::ok(body, ContentType::Json),
            Err(err) => {
                let err = QueryError::from(err);
                tracing::error!(error = %err, "Error marshalling metric names");
                raw_internal_error(&err)
            }
        }
    }
}

/// A 500 whose body is the error text, not a JSON envelope.
fn raw_internal_error(err: &QueryError) -> RenderedResponse {
    RenderedResponse {
        body: err.to_string(),
        content_type: ContentType::Json,
        status: StatusCode::INTERNAL_SERVER_ERROR,
        failed: true,
    }
}
