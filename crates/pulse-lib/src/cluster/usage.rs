//! Live pod usage from the `metrics.k8s.io` aggregation API

use super::{async_trait, UsageClient};
use crate::error::{PulseError, Result};
use crate::models::{ContainerResources, PodRecord};
use crate::units;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams, ObjectMeta};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Container entry of a `PodMetrics` object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

/// `metrics.k8s.io/v1beta1` PodMetrics
///
/// The metrics API is not part of k8s-openapi, so the resource is declared
/// here to get a typed [`Api`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerUsage>,
}

impl k8s_openapi::Resource for PodMetrics {
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const VERSION: &'static str = "v1beta1";
    const URL_PATH_SEGMENT: &'static str = "pods";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// [`UsageClient`] backed by metrics-server
#[derive(Clone)]
pub struct MetricsServerUsage {
    client: kube::Client,
}

impl MetricsServerUsage {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsageClient for MetricsServerUsage {
    async fn list_pod_usage(&self, namespace: Option<&str>) -> Result<Vec<PodRecord>> {
        let api: Api<PodMetrics> = match namespace {
            Some(ns) if !ns.is_empty() => Api::namespaced(self.client.clone(), ns),
            _ => Api::all(self.client.clone()),
        };

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| PulseError::MetricsApi(format!("failed to list pod metrics: {}", e)))?;

        debug!(count = list.items.len(), namespace = ?namespace, "Listed pod usage");
        list.items.into_iter().map(usage_record).collect()
    }
}

pub(crate) fn usage_record(metrics: PodMetrics) -> Result<PodRecord> {
    let name = metrics.name_any();
    let namespace = metrics.namespace().unwrap_or_default();

    let containers = metrics
        .containers
        .into_iter()
        .map(|c| {
            let invalid = |resource: &str, e: units::QuantityError| {
                PulseError::MetricsApi(format!(
                    "{}/{} reports invalid {} usage: {}",
                    name, c.name, resource, e
                ))
            };
            let cpu_milli = match c.usage.get("cpu") {
                Some(q) => units::milli_value(&q.0).map_err(|e| invalid("cpu", e))?,
                None => 0,
            };
            let memory_bytes = match c.usage.get("memory") {
                Some(q) => units::value(&q.0).map_err(|e| invalid("memory", e))?,
                None => 0,
            };
            Ok((
                c.name.clone(),
                ContainerResources {
                    cpu_milli,
                    memory_bytes,
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(PodRecord {
        name,
        namespace,
        node_name: None,
        containers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_metrics_deserializes_from_api_payload() {
        let payload = serde_json::json!({
            "kind": "PodMetrics",
            "apiVersion": "metrics.k8s.io/v1beta1",
            "metadata": { "name": "api-7f9c", "namespace": "team-a" },
            "timestamp": "2024-05-01T10:00:00Z",
            "window": "15s",
            "containers": [
                { "name": "api", "usage": { "cpu": "12345678n", "memory": "52428Ki" } },
                { "name": "sidecar", "usage": { "cpu": "0", "memory": "0" } }
            ]
        });

        let metrics: PodMetrics = serde_json::from_value(payload).unwrap();
        let record = usage_record(metrics).unwrap();

        assert_eq!(record.name, "api-7f9c");
        assert_eq!(record.namespace, "team-a");
        assert!(record.node_name.is_none());
        assert_eq!(record.containers["api"].cpu_milli, 13);
        assert_eq!(record.containers["api"].memory_bytes, 52428 * 1024);
        assert_eq!(record.containers["sidecar"], ContainerResources::default());
    }

    #[test]
    fn test_invalid_usage_is_a_metrics_api_error() {
        let metrics = PodMetrics {
            metadata: ObjectMeta {
                name: Some("p".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            containers: vec![ContainerUsage {
                name: "c".to_string(),
                usage: [("cpu".to_string(), Quantity("fast".to_string()))].into(),
            }],
            ..Default::default()
        };

        let err = usage_record(metrics).unwrap_err();
        assert!(matches!(err, PulseError::MetricsApi(_)));
    }
}
