//! Per-node exporter scraping
//!
//! Fetches the text exposition payload a node agent (node_exporter) serves
//! on `http://{node}:{port}/metrics` and extracts hardware temperature
//! readings from it.

pub mod exposition;

use crate::error::ExporterError;
use crate::models::TemperatureSamples;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Port node_exporter listens on by default
pub const DEFAULT_EXPORTER_PORT: u16 = 9100;

/// Whether `address` is a DNS subdomain name (RFC 1123) such as a node name
///
/// Dotted IPv4 addresses pass as well. Anything else could rewrite the
/// authority or path of the scrape URL.
pub fn is_node_address(address: &str) -> bool {
    if address.is_empty() || address.len() > 253 {
        return false;
    }
    address.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                label.len() <= 63
                    && first.is_ascii_alphanumeric()
                    && last.is_ascii_alphanumeric()
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}

/// Source of hardware temperature samples for a node
#[async_trait]
pub trait ExporterScraper: Send + Sync {
    /// Scrape `node_address` and return its temperature samples
    async fn scrape_temperature(
        &self,
        node_address: &str,
    ) -> Result<TemperatureSamples, ExporterError>;
}

/// [`ExporterScraper`] that talks plain HTTP to node_exporter
#[derive(Clone)]
pub struct HttpExporterScraper {
    client: Client,
    port: u16,
    timeout: Duration,
}

impl HttpExporterScraper {
    /// Create a scraper with a bounded per-scrape timeout
    pub fn new(port: u16, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            port,
            timeout,
        })
    }

    fn url(&self, node_address: &str) -> String {
        format!("http://{}:{}/metrics", node_address, self.port)
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> ExporterError {
        if err.is_timeout() {
            ExporterError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            ExporterError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ExporterScraper for HttpExporterScraper {
    async fn scrape_temperature(
        &self,
        node_address: &str,
    ) -> Result<TemperatureSamples, ExporterError> {
        if !is_node_address(node_address) {
            return Err(ExporterError::InvalidAddress {
                address: node_address.to_string(),
            });
        }
        let url = self.url(node_address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::NonSuccessStatus {
                url,
                status: status.to_string(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(&url, e)
            } else {
                ExporterError::Body {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let samples = exposition::temperature_samples(&body);
        debug!(url = %url, sensors = samples.len(), "Scraped node exporter");
        Ok(samples)
    }
}
