//! Error taxonomy for the metrics aggregation engine
//!
//! Every failure that aborts a query carries an [`ErrorKind`] so callers can
//! tell an unreachable control plane from a missing metrics-server or a
//! misbehaving node exporter without parsing messages.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the library
pub type Result<T, E = PulseError> = std::result::Result<T, E>;

/// Upstream systems the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Upstream {
    Inventory,
    Usage,
    Exporter,
}

impl Upstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Upstream::Inventory => "inventory",
            Upstream::Usage => "usage",
            Upstream::Exporter => "exporter",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification attached to every query failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClusterApi,
    NotFound,
    MetricsApi,
    Exporter,
    Deadline,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClusterApi => "cluster_api",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MetricsApi => "metrics_api",
            ErrorKind::Exporter => "exporter",
            ErrorKind::Deadline => "deadline",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures while scraping a node exporter
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("node exporter at {url} is unreachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("failed to fetch metrics from node exporter at {url}: {status}")]
    NonSuccessStatus { url: String, status: String },

    #[error("node exporter at {url} did not answer within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("failed to read node exporter response from {url}: {message}")]
    Body { url: String, message: String },

    #[error("\"{address}\" is not a valid node address")]
    InvalidAddress { address: String },
}

/// Errors that abort a query
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("cluster API error: {0}")]
    ClusterApi(String),

    #[error("{resource} \"{name}\" not found")]
    NotFound {
        resource: &'static str,
        name: String,
    },

    #[error("metrics API error: {0}")]
    MetricsApi(String),

    #[error(transparent)]
    Exporter(#[from] ExporterError),

    #[error("{upstream} call timed out after {limit:?}")]
    Timeout { upstream: Upstream, limit: Duration },

    #[error("query exceeded its deadline of {0:?}")]
    Deadline(Duration),
}

impl PulseError {
    /// Classification used for logs, metrics and response headers
    pub fn kind(&self) -> ErrorKind {
        match self {
            PulseError::ClusterApi(_) => ErrorKind::ClusterApi,
            PulseError::NotFound { .. } => ErrorKind::NotFound,
            PulseError::MetricsApi(_) => ErrorKind::MetricsApi,
            PulseError::Exporter(_) => ErrorKind::Exporter,
            PulseError::Timeout { upstream, .. } => match upstream {
                Upstream::Inventory => ErrorKind::ClusterApi,
                Upstream::Usage => ErrorKind::MetricsApi,
                Upstream::Exporter => ErrorKind::Exporter,
            },
            PulseError::Deadline(_) => ErrorKind::Deadline,
        }
    }

    /// The upstream responsible for this failure, if any
    ///
    /// A missing resource is the caller's problem, not the upstream's.
    pub fn upstream(&self) -> Option<Upstream> {
        match self {
            PulseError::ClusterApi(_) => Some(Upstream::Inventory),
            PulseError::NotFound { .. } => None,
            PulseError::MetricsApi(_) => Some(Upstream::Usage),
            PulseError::Exporter(_) => Some(Upstream::Exporter),
            PulseError::Timeout { upstream, .. } => Some(*upstream),
            PulseError::Deadline(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kind_follows_upstream() {
        let err = PulseError::Timeout {
            upstream: Upstream::Usage,
            limit: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorKind::MetricsApi);
        assert_eq!(err.upstream(), Some(Upstream::Usage));
    }

    #[test]
    fn test_exporter_status_message_carries_status_text() {
        let err: PulseError = ExporterError::NonSuccessStatus {
            url: "http://worker-1:9100/metrics".to_string(),
            status: "503 Service Unavailable".to_string(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Exporter);
        assert!(err.to_string().contains("503 Service Unavailable"));
    }

    #[test]
    fn test_not_found_blames_no_upstream() {
        let err = PulseError::NotFound {
            resource: "node",
            name: "ghost".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.upstream().is_none());
        assert_eq!(
            PulseError::ClusterApi("Unauthorized".to_string()).upstream(),
            Some(Upstream::Inventory)
        );
    }

    #[test]
    fn test_deadline_has_no_upstream() {
        let err = PulseError::Deadline(Duration::from_secs(10));
        assert_eq!(err.kind().as_str(), "deadline");
        assert!(err.upstream().is_none());
    }
}
