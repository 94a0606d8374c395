//! Cluster and namespace usage commands

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{ApiClient, ClusterView, NamespaceView, NodesSectionEntry, PodEntry};
use crate::output::{color_condition, print_heading, print_json, print_table, OutputFormat};

/// Keys of a pod entry that are not containers
const POD_FIELDS: [&str; 2] = ["Node", "Namespace"];

/// Keys of a node entry that are not conditions
const CAPACITY_FIELDS: [&str; 3] = ["CPU", "Memory", "Storage"];

/// Row for the nodes table
#[derive(Tabled)]
pub(crate) struct NodeRow {
    #[tabled(rename = "Node")]
    pub name: String,
    #[tabled(rename = "Ready")]
    pub ready: String,
    #[tabled(rename = "CPU")]
    pub cpu: String,
    #[tabled(rename = "Memory")]
    pub memory: String,
    #[tabled(rename = "Storage")]
    pub storage: String,
    #[tabled(rename = "Pressure")]
    pub pressure: String,
}

/// Row for the pod usage table, one per container
#[derive(Tabled)]
pub(crate) struct PodUsageRow {
    #[tabled(rename = "Pod")]
    pub pod: String,
    #[tabled(rename = "Namespace")]
    pub namespace: String,
    #[tabled(rename = "Node")]
    pub node: String,
    #[tabled(rename = "Container")]
    pub container: String,
    #[tabled(rename = "Usage")]
    pub usage: String,
}

pub(crate) fn node_row(name: &str, entry: &BTreeMap<String, String>) -> NodeRow {
    let field = |key: &str| entry.get(key).cloned().unwrap_or_default();

    // Any condition other than Ready reporting True signals pressure
    let pressure: Vec<&str> = entry
        .iter()
        .filter(|(k, v)| {
            k.as_str() != "Ready" && !CAPACITY_FIELDS.contains(&k.as_str()) && v.as_str() == "True"
        })
        .map(|(k, _)| k.as_str())
        .collect();

    NodeRow {
        name: name.to_string(),
        ready: color_condition(entry.get("Ready").map_or("Unknown", String::as_str)),
        cpu: field("CPU"),
        memory: field("Memory"),
        storage: field("Storage"),
        pressure: if pressure.is_empty() {
            "-".to_string()
        } else {
            pressure.join(", ")
        },
    }
}

pub(crate) fn pod_usage_rows(pods: &BTreeMap<String, PodEntry>) -> Vec<PodUsageRow> {
    pods.iter()
        .flat_map(|(pod, entry)| {
            let namespace = entry.get("Namespace").cloned().unwrap_or_default();
            let node = entry
                .get("Node")
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| "-".to_string());
            entry
                .iter()
                .filter(|(k, _)| !POD_FIELDS.contains(&k.as_str()))
                .map(move |(container, usage)| PodUsageRow {
                    pod: pod.clone(),
                    namespace: namespace.clone(),
                    node: node.clone(),
                    container: container.clone(),
                    usage: usage.clone(),
                })
        })
        .collect()
}

/// Show every node with cluster totals and the usage of every pod
pub async fn show_cluster(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ClusterView = client.get(&["metrics"]).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading("Nodes");

            let mut totals = Vec::new();
            let mut rows = Vec::new();
            for (name, entry) in &result.nodes {
                match entry {
                    NodesSectionEntry::Node(node) => rows.push(node_row(name, node)),
                    NodesSectionEntry::Total(value) => totals.push((name.as_str(), value.as_str())),
                }
            }
            print_table(rows, "No nodes found");
            println!();

            for (name, value) in totals {
                let label = match name {
                    "totalCPU" => "Total CPU:",
                    "totalMemory" => "Total Memory:",
                    "totalStorage" => "Total Storage:",
                    other => other,
                };
                println!("{:<16}{}", label.bold(), value.cyan());
            }
            println!();

            print_heading("Pods");
            print_table(pod_usage_rows(&result.pods), "No pod usage reported");
        }
    }

    Ok(())
}

/// Show the usage of the pods in one namespace
pub async fn show_namespace(client: &ApiClient, namespace: &str, format: OutputFormat) -> Result<()> {
    let result: NamespaceView = client.get(&["metrics", namespace]).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading(&format!("Pods in {}", namespace));
            print_table(
                pod_usage_rows(&result.pods),
                "No pod usage reported for this namespace",
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_node_row_collects_pressure_conditions() {
        colored::control::set_override(false);
        let row = node_row(
            "worker-1",
            &entry(&[
                ("Ready", "True"),
                ("MemoryPressure", "True"),
                ("DiskPressure", "False"),
                ("CPU", "4000m"),
                ("Memory", "8192Mi"),
                ("Storage", "100Gi"),
            ]),
        );

        assert_eq!(row.ready, "True");
        assert_eq!(row.cpu, "4000m");
        assert_eq!(row.pressure, "MemoryPressure");
    }

    #[test]
    fn test_pod_rows_split_containers() {
        let pods: BTreeMap<String, PodEntry> = [(
            "api".to_string(),
            entry(&[
                ("app", "CPU: 12m | RAM: 64Mi"),
                ("sidecar", "CPU: 1m | RAM: 8Mi"),
                ("Node", ""),
                ("Namespace", "team-a"),
            ]),
        )]
        .into();

        let rows = pod_usage_rows(&pods);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].container, "app");
        assert_eq!(rows[1].container, "sidecar");
        assert_eq!(rows[0].node, "-");
        assert_eq!(rows[0].namespace, "team-a");
    }
}
