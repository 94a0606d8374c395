//! Server configuration

use anyhow::Result;
use pulse_lib::CallLimits;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "PULSE_CONFIG";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port serving the query surface, health endpoints and self-metrics
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Port node exporters listen on
    #[serde(default = "default_exporter_port")]
    pub exporter_port: u16,

    /// Per-scrape timeout for node exporters
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_ms: u64,

    /// Per-call timeout for the Kubernetes API
    #[serde(default = "default_inventory_timeout")]
    pub inventory_timeout_ms: u64,

    /// Per-call timeout for metrics-server
    #[serde(default = "default_usage_timeout")]
    pub usage_timeout_ms: u64,

    /// Pod placement lookups issued at once while building a view
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,

    /// Deadline for assembling a whole view
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Explicit kubeconfig; in-cluster or default config when absent
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_exporter_port() -> u16 {
    pulse_lib::exporter::DEFAULT_EXPORTER_PORT
}

fn default_scrape_timeout() -> u64 {
    3000
}

fn default_inventory_timeout() -> u64 {
    5000
}

fn default_usage_timeout() -> u64 {
    5000
}

fn default_lookup_concurrency() -> usize {
    pulse_lib::engine::DEFAULT_LOOKUP_CONCURRENCY
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            exporter_port: default_exporter_port(),
            scrape_timeout_ms: default_scrape_timeout(),
            inventory_timeout_ms: default_inventory_timeout(),
            usage_timeout_ms: default_usage_timeout(),
            lookup_concurrency: default_lookup_concurrency(),
            request_timeout_secs: default_request_timeout(),
            kubeconfig: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// `PULSE_*` variables override file values, e.g.
    /// `PULSE_LISTEN_PORT=9000`.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("PULSE").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn call_limits(&self) -> CallLimits {
        CallLimits {
            inventory: Duration::from_millis(self.inventory_timeout_ms),
            usage: Duration::from_millis(self.usage_timeout_ms),
            exporter: Duration::from_millis(self.scrape_timeout_ms),
            lookup_concurrency: self.lookup_concurrency,
        }
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_millis(self.scrape_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.exporter_port, 9100);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.call_limits().exporter, Duration::from_secs(3));
        assert!(config.kubeconfig.is_none());
    }

    #[test]
    fn test_empty_source_uses_serde_defaults() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.usage_timeout_ms, 5000);
        assert_eq!(config.inventory_timeout_ms, 5000);
        assert_eq!(config.lookup_concurrency, 16);
    }

    #[test]
    fn test_lookup_concurrency_reaches_call_limits() {
        let config: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "lookup_concurrency = 4",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.call_limits().lookup_concurrency, 4);
        assert_eq!(config.call_limits().usage, Duration::from_secs(5));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let config: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "listen_port = 9000\nscrape_timeout_ms = 750\nkubeconfig = \"/etc/pulse/kubeconfig\"",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.scrape_timeout(), Duration::from_millis(750));
        assert_eq!(
            config.kubeconfig,
            Some(PathBuf::from("/etc/pulse/kubeconfig"))
        );
        assert_eq!(config.exporter_port, 9100);
    }
}
