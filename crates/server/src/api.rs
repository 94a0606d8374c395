//! HTTP API: the `/metrics` query surface, health endpoints and self-metrics

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use pulse_lib::{
    engine::touched_upstreams,
    health::{ComponentStatus, HealthRegistry},
    observability::{PulseMetrics, StructuredLogger},
    AggregationEngine, PulseError, QueryIntent,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Header carrying the kind of a failed query
pub const ERROR_KIND_HEADER: HeaderName = HeaderName::from_static("x-pulse-error-kind");

/// Path serving the service's own Prometheus metrics
pub const SELF_METRICS_PATH: &str = "/internal/metrics";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: AggregationEngine,
    pub health_registry: HealthRegistry,
    pub metrics: PulseMetrics,
    pub logger: StructuredLogger,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        engine: AggregationEngine,
        health_registry: HealthRegistry,
        metrics: PulseMetrics,
        logger: StructuredLogger,
        request_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            health_registry,
            metrics,
            logger,
            request_timeout,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving other views
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once the cluster client is connected
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn self_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Plain-text 500 tagged with the error kind
fn error_response(err: &PulseError) -> Response {
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    response.headers_mut().insert(
        ERROR_KIND_HEADER,
        HeaderValue::from_static(err.kind().as_str()),
    );
    response
}

/// Resolve the request path and answer with the matching view
async fn query(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    let Some(intent) = QueryIntent::from_path(uri.path()) else {
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    };
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let start = Instant::now();
    let outcome = match tokio::time::timeout(state.request_timeout, state.engine.execute(&intent))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(PulseError::Deadline(state.request_timeout)),
    };
    let elapsed = start.elapsed();

    match outcome {
        Ok(response) => {
            state.metrics.observe_query_latency(&intent, elapsed);
            state.logger.log_query(&intent, elapsed);
            state
                .health_registry
                .record_success(touched_upstreams(&intent))
                .await;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            state.metrics.inc_query_errors(&intent, &err);
            state.logger.log_query_failed(&intent, &err, elapsed);
            state.health_registry.record_failure(&err).await;
            error_response(&err)
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(SELF_METRICS_PATH, get(self_metrics))
        .fallback(query)
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
