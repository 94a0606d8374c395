//! Resolution of request paths into query intents
//!
//! | Path                               | Intent                |
//! |------------------------------------|-----------------------|
//! | `/metrics`, `/metrics/`            | `ClusterView`         |
//! | `/metrics/{namespace}`             | `NamespaceView`       |
//! | `/metrics/node/{name}`             | `NodeDetailView`      |
//! | `/metrics/node/{name}/temperature` | `NodeTemperatureView` |

use std::fmt;

/// Path prefix of the query surface
pub const METRICS_PREFIX: &str = "/metrics";

const NODE_SEGMENT: &str = "node";
const TEMPERATURE_SEGMENT: &str = "temperature";

/// What a request path asks for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryIntent {
    ClusterView,
    NamespaceView(String),
    NodeDetailView(String),
    NodeTemperatureView(String),
}

impl QueryIntent {
    /// Resolve an absolute request path; `None` if it is outside `/metrics`
    pub fn from_path(path: &str) -> Option<Self> {
        let rest = path.strip_prefix(METRICS_PREFIX)?;
        if rest.is_empty() {
            return Some(QueryIntent::ClusterView);
        }
        rest.strip_prefix('/').map(Self::from_relative)
    }

    /// Resolve a path relative to `/metrics/`
    ///
    /// `node/{name}` selects node detail and `node/{name}/temperature` its
    /// temperatures. Anything else, including a bare `node`, names a
    /// namespace; the empty path is the whole cluster.
    pub fn from_relative(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        let segments: Vec<&str> = path.split('/').collect();

        if segments.len() > 1 && segments[0] == NODE_SEGMENT && !segments[1].is_empty() {
            let node = segments[1].to_string();
            if segments.get(2) == Some(&TEMPERATURE_SEGMENT) {
                QueryIntent::NodeTemperatureView(node)
            } else {
                QueryIntent::NodeDetailView(node)
            }
        } else if path.is_empty() {
            QueryIntent::ClusterView
        } else {
            QueryIntent::NamespaceView(path.to_string())
        }
    }

    /// Stable label for logs and metrics
    pub fn view(&self) -> &'static str {
        match self {
            QueryIntent::ClusterView => "cluster",
            QueryIntent::NamespaceView(_) => "namespace",
            QueryIntent::NodeDetailView(_) => "node",
            QueryIntent::NodeTemperatureView(_) => "temperature",
        }
    }

    /// Namespace or node the query targets
    pub fn target(&self) -> Option<&str> {
        match self {
            QueryIntent::ClusterView => None,
            QueryIntent::NamespaceView(t)
            | QueryIntent::NodeDetailView(t)
            | QueryIntent::NodeTemperatureView(t) => Some(t),
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{}({})", self.view(), target),
            None => f.write_str(self.view()),
        }
    }
}
