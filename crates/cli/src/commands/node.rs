//! Node detail and temperature commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, NodeDetail, NodeTemperatures};
use crate::commands::cluster::node_row;
use crate::output::{color_temperature, print_heading, print_info, print_json, print_table, OutputFormat};

/// Row for the pod requests table, one per container
#[derive(Tabled)]
struct PodRequestRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Requests")]
    requests: String,
}

/// Row for the temperature table
#[derive(Tabled)]
struct TemperatureRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "°C")]
    celsius: String,
}

/// Label set of a sample, e.g. `chip="cpu",sensor="temp1"`
fn sensor_labels(sample: &str) -> &str {
    sample
        .split_once('{')
        .and_then(|(_, rest)| rest.rsplit_once('}'))
        .map(|(labels, _)| labels)
        .unwrap_or(sample)
}

/// Show one node with the declared requests of the pods scheduled on it
pub async fn show_node(client: &ApiClient, node: &str, format: OutputFormat) -> Result<()> {
    let result: NodeDetail = client.get(&["metrics", "node", node]).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading(&format!("Node {}", node));
            print_table(vec![node_row(node, &result.node_metrics)], "No node data");
            println!();

            print_heading("Pod requests");
            let rows: Vec<PodRequestRow> = result
                .pod_metrics
                .iter()
                .flat_map(|(pod, entry)| {
                    let namespace = entry.get("Namespace").cloned().unwrap_or_default();
                    entry
                        .iter()
                        .filter(|(k, _)| k.as_str() != "Namespace")
                        .map(move |(container, requests)| PodRequestRow {
                            pod: pod.clone(),
                            namespace: namespace.clone(),
                            container: container.clone(),
                            requests: requests.clone(),
                        })
                })
                .collect();
            print_table(rows, "No pods scheduled on this node");
        }
    }

    Ok(())
}

/// Show hardware temperatures reported by the node's exporter
pub async fn show_temperature(client: &ApiClient, node: &str, format: OutputFormat) -> Result<()> {
    let result: NodeTemperatures = client
        .get(&["metrics", "node", node, "temperature"])
        .await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading(&format!("Temperatures on {}", node.cyan()));
            if result.is_empty() {
                print_info("Node exposes no temperature sensors");
                return Ok(());
            }

            let rows: Vec<TemperatureRow> = result
                .iter()
                .map(|(sample, reading)| TemperatureRow {
                    sensor: sensor_labels(sample).to_string(),
                    celsius: color_temperature(reading),
                })
                .collect();
            print_table(rows, "No readings");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_labels() {
        assert_eq!(
            sensor_labels(r#"node_hwmon_temp_celsius{chip="cpu",sensor="temp1"} 48.5"#),
            r#"chip="cpu",sensor="temp1""#
        );
        assert_eq!(
            sensor_labels(r#"node_hwmon_temp_celsius{chip="odd}chip"} 40.0"#),
            r#"chip="odd}chip""#
        );
        assert_eq!(sensor_labels("plain"), "plain");
    }
}
