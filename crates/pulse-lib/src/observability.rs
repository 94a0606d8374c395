//! Observability infrastructure for the metrics service
//!
//! Provides:
//! - Prometheus metrics (query latency, query errors by kind, upstream latency, cluster size)
//! - Structured JSON logging with tracing

use crate::error::{PulseError, Upstream};
use crate::router::QueryIntent;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PulseMetricsInner> = OnceLock::new();

struct PulseMetricsInner {
    query_latency_seconds: HistogramVec,
    query_errors: IntCounterVec,
    upstream_latency_seconds: HistogramVec,
    cluster_nodes: IntGauge,
    cluster_pods: IntGauge,
}

impl PulseMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram_vec!(
                "k8s_pulse_query_latency_seconds",
                "Time spent assembling a query view",
                &["view"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            query_errors: register_int_counter_vec!(
                "k8s_pulse_query_errors_total",
                "Queries aborted by an upstream or deadline failure",
                &["view", "kind"]
            )
            .expect("Failed to register query_errors"),

            upstream_latency_seconds: register_histogram_vec!(
                "k8s_pulse_upstream_latency_seconds",
                "Latency of individual inventory, usage and exporter calls",
                &["upstream"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register upstream_latency_seconds"),

            cluster_nodes: register_int_gauge!(
                "k8s_pulse_cluster_nodes",
                "Nodes reported by the most recent cluster view"
            )
            .expect("Failed to register cluster_nodes"),

            cluster_pods: register_int_gauge!(
                "k8s_pulse_cluster_pods",
                "Pods reported by the most recent cluster view"
            )
            .expect("Failed to register cluster_pods"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PulseMetrics {
    _private: (),
}

impl Default for PulseMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PulseMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PulseMetricsInner {
        GLOBAL_METRICS.get_or_init(PulseMetricsInner::new)
    }

    /// Record how long a query took to assemble
    pub fn observe_query_latency(&self, intent: &QueryIntent, duration: Duration) {
        self.inner()
            .query_latency_seconds
            .with_label_values(&[intent.view()])
            .observe(duration.as_secs_f64());
    }

    /// Count a failed query by its error kind
    pub fn inc_query_errors(&self, intent: &QueryIntent, error: &PulseError) {
        self.inner()
            .query_errors
            .with_label_values(&[intent.view(), error.kind().as_str()])
            .inc();
    }

    /// Record the latency of one upstream call
    pub fn observe_upstream_latency(&self, upstream: Upstream, duration: Duration) {
        self.inner()
            .upstream_latency_seconds
            .with_label_values(&[upstream.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Update the cluster size gauges after a cluster view
    pub fn set_cluster_size(&self, nodes: usize, pods: usize) {
        self.inner().cluster_nodes.set(nodes as i64);
        self.inner().cluster_pods.set(pods as i64);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for queries and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a query that produced a view
    pub fn log_query(&self, intent: &QueryIntent, duration: Duration) {
        info!(
            event = "query_served",
            instance = %self.instance,
            view = intent.view(),
            target = intent.target().unwrap_or(""),
            duration_ms = duration.as_millis() as u64,
            "Served metrics query"
        );
    }

    /// Log a query aborted by an error
    pub fn log_query_failed(&self, intent: &QueryIntent, error: &PulseError, duration: Duration) {
        warn!(
            event = "query_failed",
            instance = %self.instance,
            view = intent.view(),
            target = intent.target().unwrap_or(""),
            kind = error.kind().as_str(),
            upstream = error.upstream().map(|u| u.as_str()).unwrap_or(""),
            duration_ms = duration.as_millis() as u64,
            error = %error,
            "Metrics query failed"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, listen_addr: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            listen_addr = %listen_addr,
            "K8s Pulse started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "K8s Pulse shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_metrics_creation() {
        let metrics = PulseMetrics::new();
        let intent = QueryIntent::ClusterView;

        metrics.observe_query_latency(&intent, Duration::from_millis(12));
        metrics.inc_query_errors(&intent, &PulseError::MetricsApi("down".to_string()));
        metrics.observe_upstream_latency(Upstream::Inventory, Duration::from_millis(3));
        metrics.set_cluster_size(3, 42);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "k8s_pulse_query_errors_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("pulse-0");
        assert_eq!(logger.instance, "pulse-0");
    }
}
