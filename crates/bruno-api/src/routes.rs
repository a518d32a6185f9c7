//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::admission::admission_middleware;
use crate::handlers::{analyze_only, generate, generate_stream, get_output, health, prompt_only, root};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_logging, security_headers, BurstLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Full runs share one hourly budget.
    let pipeline_routes = Router::new()
        .route("/generate-stream", post(generate_stream))
        .route("/generate", post(generate))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.pipeline_admission),
            admission_middleware,
        ));

    let debug_routes = Router::new()
        .route("/analyze-only", post(analyze_only))
        .route("/prompt-only", post(prompt_only))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.debug_admission),
            admission_middleware,
        ));

    let burst_limiter = Arc::new(BurstLimiter::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(pipeline_routes)
        .merge(debug_routes)
        .route("/outputs/:filename", get(get_output))
        .layer(middleware::from_fn_with_state(burst_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit, not axum's 2MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
