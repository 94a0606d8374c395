//! Query assembly over the cluster, usage and exporter clients
//!
//! The engine is stateless: every view is built from fresh upstream calls
//! and either fully succeeds or fails with the first error encountered.

use crate::cluster::{InventoryClient, UsageClient};
use crate::error::{PulseError, Result, Upstream};
use crate::exporter::{is_node_address, ExporterScraper};
use crate::models::{NodeRecord, PodRecord};
use crate::observability::PulseMetrics;
use crate::router::QueryIntent;
use crate::views::{
    ClusterViewResult, NamespaceViewResult, NodeDetailResult, NodeTemperatureResult, NodeView,
    NodesSection, PodRequestView, PodUsageView, QueryResponse,
};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Default number of pod lookups in flight at once
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 16;

/// Upper bounds for individual upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    pub inventory: Duration,
    pub usage: Duration,
    pub exporter: Duration,
    /// Pod placement lookups issued concurrently; 0 is treated as 1
    pub lookup_concurrency: usize,
}

impl Default for CallLimits {
    fn default() -> Self {
        Self {
            inventory: Duration::from_secs(5),
            usage: Duration::from_secs(5),
            exporter: Duration::from_secs(3),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }
}

impl CallLimits {
    fn for_upstream(&self, upstream: Upstream) -> Duration {
        match upstream {
            Upstream::Inventory => self.inventory,
            Upstream::Usage => self.usage,
            Upstream::Exporter => self.exporter,
        }
    }
}

/// Upstreams a successful query of this intent has exercised
pub fn touched_upstreams(intent: &QueryIntent) -> &'static [Upstream] {
    match intent {
        QueryIntent::ClusterView | QueryIntent::NamespaceView(_) => {
            &[Upstream::Inventory, Upstream::Usage]
        }
        QueryIntent::NodeDetailView(_) => &[Upstream::Inventory],
        QueryIntent::NodeTemperatureView(_) => &[Upstream::Exporter],
    }
}

/// Builds query views from live upstream state
#[derive(Clone)]
pub struct AggregationEngine {
    inventory: Arc<dyn InventoryClient>,
    usage: Arc<dyn UsageClient>,
    exporter: Arc<dyn ExporterScraper>,
    limits: CallLimits,
    metrics: PulseMetrics,
}

impl AggregationEngine {
    pub fn new(
        inventory: Arc<dyn InventoryClient>,
        usage: Arc<dyn UsageClient>,
        exporter: Arc<dyn ExporterScraper>,
        limits: CallLimits,
    ) -> Self {
        Self {
            inventory,
            usage,
            exporter,
            limits,
            metrics: PulseMetrics::new(),
        }
    }

    /// Dispatch a query intent to the matching view
    pub async fn execute(&self, intent: &QueryIntent) -> Result<QueryResponse> {
        match intent {
            QueryIntent::ClusterView => self.fetch_cluster_view().await.map(QueryResponse::Cluster),
            QueryIntent::NamespaceView(namespace) => self
                .fetch_namespace_view(namespace)
                .await
                .map(QueryResponse::Namespace),
            QueryIntent::NodeDetailView(node) => self
                .fetch_node_detail_view(node)
                .await
                .map(QueryResponse::NodeDetail),
            QueryIntent::NodeTemperatureView(node) => self
                .fetch_node_temperature_view(node)
                .await
                .map(QueryResponse::NodeTemperature),
        }
    }

    /// Every node with capacity totals, plus live usage of every pod
    #[instrument(skip(self))]
    pub async fn fetch_cluster_view(&self) -> Result<ClusterViewResult> {
        let (nodes, usage) = tokio::try_join!(
            self.bounded(Upstream::Inventory, self.inventory.list_nodes()),
            self.bounded(Upstream::Usage, self.usage.list_pod_usage(None)),
        )?;

        let pods = self.enrich_usage(usage).await?;
        self.metrics.set_cluster_size(nodes.len(), pods.len());

        Ok(ClusterViewResult {
            nodes: NodesSection::from_records(&nodes),
            pods,
        })
    }

    /// Live usage of the pods in one namespace; carries no node data
    #[instrument(skip(self))]
    pub async fn fetch_namespace_view(&self, namespace: &str) -> Result<NamespaceViewResult> {
        let usage = self
            .bounded(Upstream::Usage, self.usage.list_pod_usage(Some(namespace)))
            .await?;

        Ok(NamespaceViewResult {
            pods: self.enrich_usage(usage).await?,
        })
    }

    /// One node with the declared requests of the pods scheduled on it
    #[instrument(skip(self))]
    pub async fn fetch_node_detail_view(&self, node: &str) -> Result<NodeDetailResult> {
        let record: NodeRecord = self
            .bounded(Upstream::Inventory, self.inventory.get_node(node))
            .await?;
        let pods = self
            .bounded(Upstream::Inventory, self.inventory.list_pods(None, Some(node)))
            .await?;

        Ok(NodeDetailResult {
            node_metrics: NodeView::from(&record),
            pod_metrics: pods
                .iter()
                .map(|pod| (pod.name.clone(), PodRequestView::from(pod)))
                .collect(),
        })
    }

    /// Hardware temperatures scraped from the node's exporter
    #[instrument(skip(self))]
    pub async fn fetch_node_temperature_view(&self, node: &str) -> Result<NodeTemperatureResult> {
        // No node can carry a name that fails DNS validation
        if !is_node_address(node) {
            return Err(PulseError::NotFound {
                resource: "node",
                name: node.to_string(),
            });
        }
        let samples = self
            .bounded(Upstream::Exporter, async {
                self.exporter
                    .scrape_temperature(node)
                    .await
                    .map_err(PulseError::from)
            })
            .await?;

        Ok(NodeTemperatureResult(samples))
    }

    /// Resolve the node of every usage record and key the views by pod name
    ///
    /// At most `lookup_concurrency` lookups are in flight; results keep
    /// the order of `usage`.
    async fn enrich_usage(&self, usage: Vec<PodRecord>) -> Result<BTreeMap<String, PodUsageView>> {
        let lookups = usage.iter().map(|pod| {
            self.bounded(
                Upstream::Inventory,
                self.inventory.get_pod(&pod.namespace, &pod.name),
            )
        })
        .collect::<Vec<_>>();
        let specs: Vec<PodRecord> = stream::iter(lookups)
            .buffered(self.limits.lookup_concurrency.max(1))
            .try_collect()
            .await?;

        debug!(pods = usage.len(), "Resolved pod placement");

        Ok(usage
            .iter()
            .zip(specs.iter())
            .map(|(pod, spec)| {
                (
                    pod.name.clone(),
                    PodUsageView::new(pod, spec.node_name.as_deref()),
                )
            })
            .collect())
    }

    /// Run one upstream call under its limit and record its latency
    async fn bounded<T, F>(&self, upstream: Upstream, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.limits.for_upstream(upstream);
        let start = Instant::now();
        let outcome = tokio::time::timeout(limit, call).await;
        self.metrics.observe_upstream_latency(upstream, start.elapsed());

        match outcome {
            Ok(result) => result,
            Err(_) => Err(PulseError::Timeout { upstream, limit }),
        }
    }
}
