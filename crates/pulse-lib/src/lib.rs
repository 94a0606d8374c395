//! Cluster metrics aggregation library
//!
//! This crate provides the core functionality for:
//! - Node and pod inventory from the Kubernetes API
//! - Live pod usage from metrics-server
//! - Hardware temperature scraping from node exporters
//! - Assembling per-query views and routing request paths to them
//! - Health checks and observability

pub mod cluster;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod health;
pub mod models;
pub mod observability;
pub mod router;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod units;
pub mod views;

pub use cluster::{InventoryClient, KubeInventory, MetricsServerUsage, UsageClient};
pub use engine::{AggregationEngine, CallLimits};
pub use error::{ErrorKind, ExporterError, PulseError, Result, Upstream};
pub use exporter::{ExporterScraper, HttpExporterScraper};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PulseMetrics, StructuredLogger};
pub use router::QueryIntent;
pub use views::QueryResponse;
