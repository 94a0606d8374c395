//! K8s Pulse - cluster metrics query service
//!
//! Serves node capacity, pod usage and node temperature views assembled
//! on demand from the Kubernetes API, metrics-server and node exporters.

use anyhow::Result;
use pulse_lib::{
    health::{components, HealthRegistry},
    observability::{PulseMetrics, StructuredLogger},
    AggregationEngine, HttpExporterScraper, KubeInventory, MetricsServerUsage,
};
use pulse_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting k8s-pulse");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        listen_port = config.listen_port,
        exporter_port = config.exporter_port,
        "Server configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    for component in components::ALL {
        health_registry.register(component).await;
    }

    let metrics = PulseMetrics::new();
    let instance = std::env::var("HOSTNAME").unwrap_or_else(|_| "k8s-pulse".to_string());
    let logger = StructuredLogger::new(instance);

    // Connect upstream clients
    let client = pulse_lib::cluster::connect(config.kubeconfig.as_deref()).await?;
    let exporter = HttpExporterScraper::new(config.exporter_port, config.scrape_timeout())?;
    let engine = AggregationEngine::new(
        Arc::new(KubeInventory::new(client.clone())),
        Arc::new(MetricsServerUsage::new(client)),
        Arc::new(exporter),
        config.call_limits(),
    );

    let app_state = Arc::new(api::AppState::new(
        engine,
        health_registry.clone(),
        metrics,
        logger.clone(),
        config.request_timeout(),
    ));

    // Ready once the cluster client exists
    health_registry.set_ready(true).await;
    logger.log_startup(PULSE_VERSION, &format!("0.0.0.0:{}", config.listen_port));

    let shutdown_logger = logger.clone();
    api::serve(config.listen_port, app_state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shut down");
    Ok(())
}
