//! HTTP middleware for the query server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::Instrument;

use super::metrics::{HttpLabelsWithStatus, HttpMethod, Metrics};

/// Paths recorded verbatim in request metrics.
const KNOWN_ENDPOINTS: &[&str] = &[
    "/api/query",
    "/api/query_range",
    "/api/metrics",
    "/metrics",
    "/-/healthy",
    "/-/ready",
];

/// Layer that counts HTTP requests by method, endpoint and status.
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<Metrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S, ResBody> Service<Request<Body>> for MetricsService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let labels = (
            HttpMethod::from(request.method()),
            endpoint_label(request.uri().path()),
        );
        let counter = self.metrics.http_requests_total.clone();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            let (method, endpoint) = labels;
            counter
                .get_or_create(&HttpLabelsWithStatus {
                    method,
                    endpoint,
                    status: response.status().as_u16(),
                })
                .inc();
            Ok(response)
        })
    }
}

/// Collapses unknown paths into a single label value so arbitrary request
/// paths cannot grow the metric's cardinality.
fn endpoint_label(path: &str) -> String {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    if KNOWN_ENDPOINTS.contains(&trimmed) {
        trimmed.to_string()
    } else {
        "other".to_string()
    }
}

/// Layer that logs HTTP requests and responses at debug level.
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S, ResBody> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let span = tracing::debug_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path()
        );
        let started = Instant::now();
        let future = span.in_scope(|| {
            tracing::debug!("request received");
            self.inner.call(request)
        });

        Box::pin(
            async move {
                let response = future.await?;
                tracing::debug!(
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request completed"
                );
                Ok(response)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use rstest::rstest;
    use tower::service_fn;

    #[rstest]
    #[case("/api/query", "/api/query")]
    #[case("/api/query_range", "/api/query_range")]
    #[case("/api/metrics/", "/api/metrics")]
    #[case("/metrics", "/metrics")]
    #[case("/-/ready", "/-/ready")]
    #[case("/api/v1/query", "other")]
    #[case("/", "other")]
    fn should_label_endpoint(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(endpoint_label(path), expected);
    }

    #[tokio::test]
    async fn should_count_requests_by_endpoint_and_status() {
        // given
        let metrics = Arc::new(Metrics::new());
        let inner = service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(
                Response::builder().status(404).body(Body::empty()).unwrap(),
            )
        });
        let mut service = MetricsLayer::new(metrics.clone()).layer(inner);

        // when
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/query?expr=up")
            .body(Body::empty())
            .unwrap();
        service.call(request).await.unwrap();

        // then
        let count = metrics
            .http_requests_total
            .get_or_create(&HttpLabelsWithStatus {
                method: HttpMethod::Get,
                endpoint: "/api/query".to_string(),
                status: 404,
            })
            .get();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn should_pass_response_through_tracing_layer() {
        let inner = service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(
                Response::builder().status(200).body(Body::empty()).unwrap(),
            )
        });
        let mut service = TracingLayer::new().layer(inner);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/query_range")
            .body(Body::empty())
            .unwrap();
        let response = service.call(request).await.unwrap();

        assert_eq!(response.status().as_u16(), 200);
    }
}
