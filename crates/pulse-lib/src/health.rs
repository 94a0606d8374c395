//! Health check infrastructure for the metrics service
//!
//! Tracks the upstreams queries depend on and reports status for
//! Kubernetes liveness and readiness checks. Query outcomes feed the
//! registry: a success marks every touched upstream healthy, a failure
//! degrades the upstream responsible for it. A control-plane upstream that
//! keeps failing becomes unhealthy, which fails liveness and readiness.

use crate::error::{PulseError, Upstream};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

/// Consecutive failures after which inventory or usage is unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
            consecutive_failures: 0,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
            consecutive_failures: 0,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
            consecutive_failures: 0,
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Compute overall status from component statuses
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const INVENTORY: &str = "inventory";
    pub const USAGE: &str = "usage";
    pub const EXPORTER: &str = "exporter";

    pub const ALL: [&str; 3] = [INVENTORY, USAGE, EXPORTER];
}

fn component_for(upstream: Upstream) -> &'static str {
    match upstream {
        Upstream::Inventory => components::INVENTORY,
        Upstream::Usage => components::USAGE,
        Upstream::Exporter => components::EXPORTER,
    }
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Mark component as healthy
    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Mark the upstreams a successful query touched as healthy
    pub async fn record_success(&self, upstreams: &[Upstream]) {
        for upstream in upstreams {
            self.set_healthy(component_for(*upstream)).await;
        }
    }

    /// Degrade the upstream responsible for a failed query
    ///
    /// Deadline overruns and missing resources are not attributed to any
    /// upstream. Inventory and usage turn unhealthy after
    /// [`UNHEALTHY_AFTER_FAILURES`] failures in a row; exporters are per
    /// node, so their failures only ever degrade.
    pub async fn record_failure(&self, error: &PulseError) {
        let Some(upstream) = error.upstream() else {
            return;
        };
        let name = component_for(upstream);

        let mut components = self.components.write().await;
        let failures = components
            .get(name)
            .map_or(0, |health| health.consecutive_failures)
            .saturating_add(1);
        let mut health = if upstream != Upstream::Exporter && failures >= UNHEALTHY_AFTER_FAILURES
        {
            ComponentHealth::unhealthy(error.to_string())
        } else {
            ComponentHealth::degraded(error.to_string())
        };
        health.consecutive_failures = failures;
        components.insert(name.to_string(), health);
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let critical_healthy = health.status != ComponentStatus::Unhealthy;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Cluster client not yet connected".to_string()),
            }
        } else if !critical_healthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_health_registry_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::INVENTORY).await;

        let health = registry.health().await;
        assert!(health.components.contains_key(components::INVENTORY));
        assert_eq!(
            health.components[components::INVENTORY].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_health_registry_degraded_status() {
        let registry = HealthRegistry::new();
        registry.register(components::INVENTORY).await;
        registry.register(components::USAGE).await;

        registry
            .update(components::INVENTORY, ComponentHealth::degraded("High latency"))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_health_registry_unhealthy_status() {
        let registry = HealthRegistry::new();
        registry.register(components::INVENTORY).await;
        registry.register(components::USAGE).await;

        registry
            .update(components::INVENTORY, ComponentHealth::unhealthy("Unauthorized"))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_ready_when_set() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
    }

    #[tokio::test]
    async fn test_query_outcomes_drive_component_status() {
        let registry = HealthRegistry::new();
        for component in components::ALL {
            registry.register(component).await;
        }

        let err = PulseError::Exporter(crate::error::ExporterError::NonSuccessStatus {
            url: "http://worker-1:9100/metrics".to_string(),
            status: "503 Service Unavailable".to_string(),
        });
        registry.record_failure(&err).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::EXPORTER].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::INVENTORY].status,
            ComponentStatus::Healthy
        );

        registry.record_success(&[Upstream::Exporter]).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_deadline_is_not_attributed() {
        let registry = HealthRegistry::new();
        registry.register(components::USAGE).await;
        registry
            .record_failure(&PulseError::Deadline(std::time::Duration::from_secs(10)))
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_attributed() {
        let registry = HealthRegistry::new();
        registry.register(components::INVENTORY).await;
        registry
            .record_failure(&PulseError::NotFound {
                resource: "node",
                name: "ghost".to_string(),
            })
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_repeated_usage_failures_become_unhealthy() {
        let registry = HealthRegistry::new();
        for component in components::ALL {
            registry.register(component).await;
        }
        registry.set_ready(true).await;

        let err = PulseError::MetricsApi("metrics.k8s.io is not available".to_string());
        for _ in 1..UNHEALTHY_AFTER_FAILURES {
            registry.record_failure(&err).await;
        }
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);

        registry.record_failure(&err).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::USAGE].consecutive_failures,
            UNHEALTHY_AFTER_FAILURES
        );
        assert!(!registry.readiness().await.ready);

        registry.record_success(&[Upstream::Inventory, Upstream::Usage]).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components[components::USAGE].consecutive_failures, 0);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_exporter_failures_only_degrade() {
        let registry = HealthRegistry::new();
        registry.register(components::EXPORTER).await;

        let err = PulseError::Exporter(crate::error::ExporterError::Unreachable {
            url: "http://worker-1:9100/metrics".to_string(),
            message: "connection refused".to_string(),
        });
        for _ in 0..UNHEALTHY_AFTER_FAILURES * 2 {
            registry.record_failure(&err).await;
        }

        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::INVENTORY).await;
        registry.set_ready(true).await;
        registry
            .update(components::INVENTORY, ComponentHealth::unhealthy("Failed"))
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }
}
