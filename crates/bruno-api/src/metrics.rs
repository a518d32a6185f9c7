//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "bruno_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "bruno_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "bruno_http_requests_in_flight";

    // Progress streams
    pub const SSE_STREAMS_ACTIVE: &str = "bruno_sse_streams_active";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "bruno_rate_limit_hits_total";
    pub const ADMISSION_REJECTIONS_TOTAL: &str = "bruno_admission_rejections_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn sse_stream_opened() {
    gauge!(names::SSE_STREAMS_ACTIVE).increment(1.0);
}

pub fn sse_stream_closed() {
    gauge!(names::SSE_STREAMS_ACTIVE).decrement(1.0);
}

/// Record a burst limiter hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Record an admission budget rejection.
pub fn record_admission_rejected(budget: &'static str) {
    counter!(names::ADMISSION_REJECTIONS_TOTAL, "budget" => budget).increment(1);
}

/// Collapse per-file paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    match path.strip_prefix("/api/outputs/") {
        Some(_) => "/api/outputs/:filename".to_string(),
        None => path.to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}
