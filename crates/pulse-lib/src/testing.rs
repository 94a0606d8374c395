//! In-memory upstream fakes for exercising the engine without a cluster

use crate::cluster::{InventoryClient, UsageClient};
use crate::error::{ExporterError, PulseError, Result};
use crate::exporter::ExporterScraper;
use crate::models::{ContainerResources, NodeCapacity, NodeRecord, PodRecord, TemperatureSamples};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Build a ready node with the given capacity
pub fn node(name: &str, cpu_milli: u64, memory_bytes: u64, storage_bytes: u64) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        conditions: [("Ready".to_string(), "True".to_string())].into(),
        capacity: NodeCapacity {
            cpu_milli,
            memory_bytes,
            storage_bytes,
        },
    }
}

/// Build a pod whose containers all carry the same figures
pub fn pod(
    namespace: &str,
    name: &str,
    node_name: Option<&str>,
    containers: &[(&str, u64, u64)],
) -> PodRecord {
    PodRecord {
        name: name.to_string(),
        namespace: namespace.to_string(),
        node_name: node_name.map(str::to_string),
        containers: containers
            .iter()
            .map(|(container, cpu_milli, memory_bytes)| {
                (
                    container.to_string(),
                    ContainerResources {
                        cpu_milli: *cpu_milli,
                        memory_bytes: *memory_bytes,
                    },
                )
            })
            .collect(),
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Inventory backed by fixed node and pod lists
#[derive(Debug, Default, Clone)]
pub struct FakeInventory {
    nodes: Vec<NodeRecord>,
    pods: Vec<PodRecord>,
    node_failure: Option<String>,
    pod_failure: Option<String>,
    delay: Option<Duration>,
    pod_lookups: Arc<AtomicUsize>,
    lookups_in_flight: Arc<AtomicUsize>,
    peak_lookups_in_flight: Arc<AtomicUsize>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeRecord) -> Self {
        self.nodes.push(node);
        self
    }

    /// Pods as declared in their specs, requests and placement included
    pub fn with_pod(mut self, pod: PodRecord) -> Self {
        self.pods.push(pod);
        self
    }

    /// Make node listing and lookup fail with a cluster API error
    pub fn failing_nodes(mut self, message: &str) -> Self {
        self.node_failure = Some(message.to_string());
        self
    }

    /// Make pod listing and lookup fail with a cluster API error
    pub fn failing_pods(mut self, message: &str) -> Self {
        self.pod_failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of single-pod lookups served so far
    pub fn pod_lookups(&self) -> usize {
        self.pod_lookups.load(Ordering::SeqCst)
    }

    /// Highest number of single-pod lookups that were pending at once
    pub fn peak_pod_lookups(&self) -> usize {
        self.peak_lookups_in_flight.load(Ordering::SeqCst)
    }

    fn check(failure: &Option<String>) -> Result<()> {
        match failure {
            Some(message) => Err(PulseError::ClusterApi(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        pause(self.delay).await;
        Self::check(&self.node_failure)?;
        Ok(self.nodes.clone())
    }

    async fn get_node(&self, name: &str) -> Result<NodeRecord> {
        pause(self.delay).await;
        Self::check(&self.node_failure)?;
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .ok_or_else(|| PulseError::NotFound {
                resource: "node",
                name: name.to_string(),
            })
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        node: Option<&str>,
    ) -> Result<Vec<PodRecord>> {
        pause(self.delay).await;
        Self::check(&self.pod_failure)?;
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.map_or(true, |ns| p.namespace == ns))
            .filter(|p| node.map_or(true, |n| p.node_name.as_deref() == Some(n)))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodRecord> {
        self.pod_lookups.fetch_add(1, Ordering::SeqCst);
        let pending = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_lookups_in_flight.fetch_max(pending, Ordering::SeqCst);
        pause(self.delay).await;
        self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);
        Self::check(&self.pod_failure)?;
        self.pods
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
            .ok_or_else(|| PulseError::NotFound {
                resource: "pod",
                name: format!("{}/{}", namespace, name),
            })
    }
}

/// Usage source backed by a fixed list of samples
#[derive(Debug, Default, Clone)]
pub struct FakeUsage {
    pods: Vec<PodRecord>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl FakeUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live usage sample; `node_name` should be left empty
    pub fn with_pod(mut self, pod: PodRecord) -> Self {
        self.pods.push(pod);
        self
    }

    /// Make every listing fail with a metrics API error
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl UsageClient for FakeUsage {
    async fn list_pod_usage(&self, namespace: Option<&str>) -> Result<Vec<PodRecord>> {
        pause(self.delay).await;
        if let Some(message) = &self.failure {
            return Err(PulseError::MetricsApi(message.clone()));
        }
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.map_or(true, |ns| p.namespace == ns))
            .cloned()
            .collect())
    }
}

/// Exporter returning canned samples per node address
#[derive(Debug, Default, Clone)]
pub struct FakeExporter {
    nodes: BTreeMap<String, TemperatureSamples>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl FakeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reachable node; an empty sample set is valid
    pub fn with_node(mut self, address: &str, samples: TemperatureSamples) -> Self {
        self.nodes.insert(address.to_string(), samples);
        self
    }

    /// Make every scrape answer with the given HTTP status
    pub fn failing(mut self, status: &str) -> Self {
        self.failure = Some(status.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ExporterScraper for FakeExporter {
    async fn scrape_temperature(
        &self,
        node_address: &str,
    ) -> std::result::Result<TemperatureSamples, ExporterError> {
        pause(self.delay).await;
        let url = format!("http://{}:9100/metrics", node_address);
        if let Some(status) = &self.failure {
            return Err(ExporterError::NonSuccessStatus {
                url,
                status: status.clone(),
            });
        }
        self.nodes
            .get(node_address)
            .cloned()
            .ok_or_else(|| ExporterError::Unreachable {
                url,
                message: "no such host".to_string(),
            })
    }
}
