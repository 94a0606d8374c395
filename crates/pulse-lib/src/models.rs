//! Core data models for the metrics aggregation engine
//!
//! All records are request-scoped values: built fresh from live upstream
//! state for each query and never cached.

use crate::units;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capacity advertised by a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu_milli: u64,
    pub memory_bytes: u64,
    pub storage_bytes: u64,
}

/// A cluster node as reported by the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    /// Condition type -> status, e.g. `"Ready" -> "True"`
    pub conditions: BTreeMap<String, String>,
    pub capacity: NodeCapacity,
}

/// CPU and memory figures for one container, either declared requests or live usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    pub cpu_milli: u64,
    pub memory_bytes: u64,
}

/// A pod with per-container resource figures
///
/// Inventory lookups fill `containers` with declared requests and set
/// `node_name` from the pod spec. Usage listings fill `containers` with
/// live usage and leave `node_name` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub node_name: Option<String>,
    pub containers: BTreeMap<String, ContainerResources>,
}

/// Cluster-wide capacity totals, floored to whole units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTotals {
    pub total_cpu_cores: u64,
    pub total_memory_gib: u64,
    pub total_storage_gib: u64,
}

impl ClusterTotals {
    /// Sum capacities over `nodes`, then floor-divide into display units
    pub fn from_nodes(nodes: &[NodeRecord]) -> Self {
        let (cpu, memory, storage) = nodes.iter().fold((0u128, 0u128, 0u128), |acc, node| {
            (
                acc.0 + node.capacity.cpu_milli as u128,
                acc.1 + node.capacity.memory_bytes as u128,
                acc.2 + node.capacity.storage_bytes as u128,
            )
        });

        Self {
            total_cpu_cores: units::whole_cores(cpu),
            total_memory_gib: units::whole_gibibytes(memory),
            total_storage_gib: units::whole_gibibytes(storage),
        }
    }
}

/// Temperature readings keyed by the full matched exposition text
pub type TemperatureSamples = BTreeMap<String, String>;
