//! Typed results for each query intent
//!
//! The JSON shape is flat and string-valued: node entries mix condition
//! statuses with `CPU`/`Memory`/`Storage`, pod entries mix container
//! figures with `Node`/`Namespace`. Each view is its own type, so a
//! namespace-scoped result cannot carry node or totals data.
//!
//! A condition type or container name equal to one of the fixed keys is
//! dropped so every object carries each key once and the fixed value wins.

use crate::models::{ClusterTotals, NodeRecord, PodRecord, TemperatureSamples};
use crate::units;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

const NODE_KEYS: [&str; 3] = ["CPU", "Memory", "Storage"];
const POD_USAGE_KEYS: [&str; 2] = ["Node", "Namespace"];
const POD_REQUEST_KEYS: [&str; 1] = ["Namespace"];

/// Normalized node entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub conditions: BTreeMap<String, String>,
    #[serde(rename = "CPU")]
    pub cpu: String,
    #[serde(rename = "Memory")]
    pub memory: String,
    #[serde(rename = "Storage")]
    pub storage: String,
}

impl From<&NodeRecord> for NodeView {
    fn from(node: &NodeRecord) -> Self {
        Self {
            conditions: node
                .conditions
                .iter()
                .filter(|(kind, _)| !NODE_KEYS.contains(&kind.as_str()))
                .map(|(kind, status)| (kind.clone(), status.clone()))
                .collect(),
            cpu: units::cpu_display(node.capacity.cpu_milli),
            memory: units::memory_display(node.capacity.memory_bytes),
            storage: units::storage_display(node.capacity.storage_bytes),
        }
    }
}

/// All nodes plus cluster totals, serialized as one flat object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodesSection {
    pub nodes: BTreeMap<String, NodeView>,
    pub totals: ClusterTotals,
}

impl NodesSection {
    pub fn from_records(records: &[NodeRecord]) -> Self {
        Self {
            nodes: records
                .iter()
                .map(|n| (n.name.clone(), NodeView::from(n)))
                .collect(),
            totals: ClusterTotals::from_nodes(records),
        }
    }
}

impl Serialize for NodesSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len() + 3))?;
        for (name, node) in &self.nodes {
            map.serialize_entry(name, node)?;
        }
        map.serialize_entry("totalCPU", &units::cores_display(self.totals.total_cpu_cores))?;
        map.serialize_entry(
            "totalMemory",
            &units::gibibytes_display(self.totals.total_memory_gib),
        )?;
        map.serialize_entry(
            "totalStorage",
            &units::gibibytes_display(self.totals.total_storage_gib),
        )?;
        map.end()
    }
}

/// Live usage of one pod, enriched with where it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodUsageView {
    #[serde(flatten)]
    pub containers: BTreeMap<String, String>,
    #[serde(rename = "Node")]
    pub node: String,
    #[serde(rename = "Namespace")]
    pub namespace: String,
}

impl PodUsageView {
    /// `usage` supplies the container figures, `node` the resolved scheduling target
    pub fn new(usage: &PodRecord, node: Option<&str>) -> Self {
        Self {
            containers: container_figures(usage, &POD_USAGE_KEYS),
            node: node.unwrap_or_default().to_string(),
            namespace: usage.namespace.clone(),
        }
    }
}

/// Declared requests of one pod on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRequestView {
    #[serde(flatten)]
    pub containers: BTreeMap<String, String>,
    #[serde(rename = "Namespace")]
    pub namespace: String,
}

impl From<&PodRecord> for PodRequestView {
    fn from(pod: &PodRecord) -> Self {
        Self {
            containers: container_figures(pod, &POD_REQUEST_KEYS),
            namespace: pod.namespace.clone(),
        }
    }
}

fn container_figures(pod: &PodRecord, reserved: &[&str]) -> BTreeMap<String, String> {
    pod.containers
        .iter()
        .filter(|(name, _)| !reserved.contains(&name.as_str()))
        .map(|(name, resources)| (name.clone(), units::container_display(resources)))
        .collect()
}

/// Whole-cluster view: nodes with totals, and every pod's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterViewResult {
    pub nodes: NodesSection,
    pub pods: BTreeMap<String, PodUsageView>,
}

/// Namespace-scoped view: pod usage only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceViewResult {
    pub pods: BTreeMap<String, PodUsageView>,
}

/// One node with the declared requests of the pods scheduled on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDetailResult {
    #[serde(rename = "nodeMetrics")]
    pub node_metrics: NodeView,
    #[serde(rename = "podMetrics")]
    pub pod_metrics: BTreeMap<String, PodRequestView>,
}

/// Hardware temperature samples of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeTemperatureResult(pub TemperatureSamples);

/// Result of executing any query intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Cluster(ClusterViewResult),
    Namespace(NamespaceViewResult),
    NodeDetail(NodeDetailResult),
    NodeTemperature(NodeTemperatureResult),
}
