//! API client for the K8s Pulse query surface

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Header the server sets on failed queries
const ERROR_KIND_HEADER: &str = "x-pulse-error-kind";

/// API client for the K8s Pulse server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Resolve path segments against the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(segment) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            bail!("Invalid path segment \"{}\"", segment);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request for the resource under `segments`
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let kind = response
                .headers()
                .get(ERROR_KIND_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            match kind {
                Some(kind) => bail!("API error ({}, {}): {}", status, kind, body.trim()),
                None => bail!("API error ({}): {}", status, body.trim()),
            }
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

/// Container name, `Node` and `Namespace` mapped to display strings
pub type PodEntry = BTreeMap<String, String>;

/// Condition statuses plus `CPU`, `Memory` and `Storage`
pub type NodeEntry = BTreeMap<String, String>;

/// A value in the `nodes` section: a node, or one of the cluster totals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodesSectionEntry {
    Node(NodeEntry),
    Total(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterView {
    pub nodes: BTreeMap<String, NodesSectionEntry>,
    pub pods: BTreeMap<String, PodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceView {
    pub pods: BTreeMap<String, PodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetail {
    #[serde(rename = "nodeMetrics")]
    pub node_metrics: NodeEntry,
    #[serde(rename = "podMetrics")]
    pub pod_metrics: BTreeMap<String, PodEntry>,
}

/// Sample text -> reading
pub type NodeTemperatures = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_cluster_view() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "nodes": {
                        "worker-1": {"Ready": "True", "CPU": "4000m", "Memory": "8192Mi", "Storage": "100Gi"},
                        "totalCPU": "4 cores",
                        "totalMemory": "8 GiB",
                        "totalStorage": "100 GiB"
                    },
                    "pods": {
                        "api": {"app": "CPU: 12m | RAM: 64Mi", "Node": "worker-1", "Namespace": "team-a"}
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let view: ClusterView = client.get(&["metrics"]).await.unwrap();

        mock.assert_async().await;
        assert!(matches!(&view.nodes["worker-1"], NodesSectionEntry::Node(n) if n["CPU"] == "4000m"));
        assert!(matches!(&view.nodes["totalCPU"], NodesSectionEntry::Total(t) if t == "4 cores"));
        assert_eq!(view.pods["api"]["Namespace"], "team-a");
    }

    #[tokio::test]
    async fn test_error_carries_kind_and_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metrics/node/ghost")
            .with_status(500)
            .with_header("x-pulse-error-kind", "not_found")
            .with_body("node \"ghost\" not found\n")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<NodeDetail>(&["metrics", "node", "ghost"])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("not_found"));
        assert!(message.contains("node \"ghost\" not found"));
    }

    #[test]
    fn test_segments_are_encoded() {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        assert_eq!(
            client.url(&["metrics", "a?b"]).unwrap().as_str(),
            "http://localhost:8080/metrics/a%3Fb"
        );
        assert_eq!(
            client.url(&["metrics", "node", "x/../y", "temperature"]).unwrap().as_str(),
            "http://localhost:8080/metrics/node/x%2F..%2Fy/temperature"
        );
        assert_eq!(
            client.url(&["metrics", "team#a"]).unwrap().as_str(),
            "http://localhost:8080/metrics/team%23a"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let client = ApiClient::new("http://gateway/pulse/").unwrap();
        assert_eq!(
            client.url(&["metrics"]).unwrap().as_str(),
            "http://gateway/pulse/metrics"
        );
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        assert!(client.url(&["metrics", ".."]).is_err());
        assert!(client.url(&["metrics", "."]).is_err());
        assert!(client.url(&["metrics", ""]).is_err());
    }

    #[tokio::test]
    async fn test_namespace_with_query_characters_stays_in_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics/a%3Fb")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pods": {}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let view: NamespaceView = client.get(&["metrics", "a?b"]).await.unwrap();

        mock.assert_async().await;
        assert!(view.pods.is_empty());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
