//! Node and pod inventory backed by the Kubernetes API

use super::{async_trait, InventoryClient};
use crate::error::{PulseError, Result};
use crate::models::{ContainerResources, NodeCapacity, NodeRecord, PodRecord};
use crate::units::{self, QuantityError};
use k8s_openapi::api::core::v1::{Container, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

const CPU: &str = "cpu";
const MEMORY: &str = "memory";
const EPHEMERAL_STORAGE: &str = "ephemeral-storage";

/// [`InventoryClient`] that reads nodes and pods from the control plane
#[derive(Clone)]
pub struct KubeInventory {
    client: kube::Client,
}

impl KubeInventory {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) if !ns.is_empty() => Api::namespaced(self.client.clone(), ns),
            _ => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl InventoryClient for KubeInventory {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| PulseError::ClusterApi(format!("failed to list nodes: {}", e)))?;

        debug!(count = list.items.len(), "Listed nodes");
        list.items.into_iter().map(node_record).collect()
    }

    async fn get_node(&self, name: &str) -> Result<NodeRecord> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes
            .get(name)
            .await
            .map_err(|e| lookup_error("node", name, e))?;
        node_record(node)
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        node: Option<&str>,
    ) -> Result<Vec<PodRecord>> {
        let mut params = ListParams::default();
        if let Some(node) = node {
            params = params.fields(&format!("spec.nodeName={}", node));
        }

        let list = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(|e| PulseError::ClusterApi(format!("failed to list pods: {}", e)))?;

        debug!(count = list.items.len(), node = ?node, "Listed pods");
        list.items.into_iter().map(pod_record).collect()
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodRecord> {
        let pod = self
            .pods(Some(namespace))
            .get(name)
            .await
            .map_err(|e| lookup_error("pod", &format!("{}/{}", namespace, name), e))?;
        pod_record(pod)
    }
}

fn lookup_error(resource: &'static str, name: &str, err: kube::Error) -> PulseError {
    match err {
        kube::Error::Api(response) if response.code == 404 => PulseError::NotFound {
            resource,
            name: name.to_string(),
        },
        other => PulseError::ClusterApi(format!("failed to get {} {}: {}", resource, name, other)),
    }
}

fn quantity_error(owner: &str, resource: &str, err: QuantityError) -> PulseError {
    PulseError::ClusterApi(format!("{} reports invalid {}: {}", owner, resource, err))
}

/// Look up `key` and convert it; an absent entry counts as zero
fn quantity(
    map: Option<&BTreeMap<String, Quantity>>,
    key: &str,
    convert: fn(&str) -> std::result::Result<u64, QuantityError>,
) -> std::result::Result<u64, QuantityError> {
    match map.and_then(|m| m.get(key)) {
        Some(q) => convert(&q.0),
        None => Ok(0),
    }
}

pub(crate) fn node_record(node: Node) -> Result<NodeRecord> {
    let name = node.name_any();
    let status = node.status.unwrap_or_default();

    let conditions = status
        .conditions
        .unwrap_or_default()
        .into_iter()
        .map(|c| (c.type_, c.status))
        .collect();

    let capacity = status.capacity.as_ref();
    let capacity = NodeCapacity {
        cpu_milli: quantity(capacity, CPU, units::milli_value)
            .map_err(|e| quantity_error(&name, CPU, e))?,
        memory_bytes: quantity(capacity, MEMORY, units::value)
            .map_err(|e| quantity_error(&name, MEMORY, e))?,
        storage_bytes: quantity(capacity, EPHEMERAL_STORAGE, units::value)
            .map_err(|e| quantity_error(&name, EPHEMERAL_STORAGE, e))?,
    };

    Ok(NodeRecord {
        name,
        conditions,
        capacity,
    })
}

fn container_requests(pod: &str, container: &Container) -> Result<ContainerResources> {
    let requests = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref());
    let owner = format!("{}/{}", pod, container.name);

    Ok(ContainerResources {
        cpu_milli: quantity(requests, CPU, units::milli_value)
            .map_err(|e| quantity_error(&owner, CPU, e))?,
        memory_bytes: quantity(requests, MEMORY, units::value)
            .map_err(|e| quantity_error(&owner, MEMORY, e))?,
    })
}

pub(crate) fn pod_record(pod: Pod) -> Result<PodRecord> {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    let spec = pod.spec.unwrap_or_default();

    let containers = spec
        .containers
        .iter()
        .map(|c| Ok((c.name.clone(), container_requests(&name, c)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(PodRecord {
        name,
        namespace,
        node_name: spec.node_name.filter(|n| !n.is_empty()),
        containers,
    })
}
