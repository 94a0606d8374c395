//! Cluster inventory and workload usage sources
//!
//! This module provides the two control-plane facing clients the engine
//! depends on:
//! - [`InventoryClient`] for nodes and pod specs
//! - [`UsageClient`] for live per-container usage from metrics-server
//!
//! Both are traits so the engine can be driven by in-memory fakes in tests.

mod inventory;
mod usage;

pub use inventory::KubeInventory;
pub use usage::{MetricsServerUsage, PodMetrics};

use crate::error::{PulseError, Result};
use crate::models::{NodeRecord, PodRecord};
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::Path;
use tracing::info;

pub use async_trait::async_trait;

/// Read access to cluster nodes and pods
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// List every node visible to the configured credentials
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Fetch one node by name
    async fn get_node(&self, name: &str) -> Result<NodeRecord>;

    /// List pods with their declared container requests
    ///
    /// `namespace: None` means all namespaces. `node` restricts the listing
    /// to pods scheduled on that node and is applied server-side.
    async fn list_pods(&self, namespace: Option<&str>, node: Option<&str>)
        -> Result<Vec<PodRecord>>;

    /// Fetch one pod, used to resolve the node a usage record runs on
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodRecord>;
}

/// Read access to live pod usage
#[async_trait]
pub trait UsageClient: Send + Sync {
    /// List the latest per-container usage, optionally scoped to a namespace
    ///
    /// Pods the aggregator has not sampled yet are simply absent.
    async fn list_pod_usage(&self, namespace: Option<&str>) -> Result<Vec<PodRecord>>;
}

/// Build a Kubernetes client
///
/// An explicit kubeconfig path wins; otherwise the in-cluster service
/// account is tried first, then the user's default kubeconfig.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<kube::Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                PulseError::ClusterApi(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| PulseError::ClusterApi(format!("invalid kubeconfig: {}", e)))?
        }
        None => kube::Config::infer()
            .await
            .map_err(|e| PulseError::ClusterApi(format!("failed to infer cluster config: {}", e)))?,
    };

    info!(cluster_url = %config.cluster_url, "Connecting to cluster");

    kube::Client::try_from(config)
        .map_err(|e| PulseError::ClusterApi(format!("failed to create cluster client: {}", e)))
}
