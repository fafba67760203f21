use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of one candidate node, taken at the start of a scheduling cycle.
///
/// Read-only to the scheduling cycle; only the cluster state store mutates
/// the underlying node, and changes are observed through the event feed.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    /// The node object at snapshot time
    pub node: Node,
    /// Number of pods currently bound to this node
    pub pod_count: usize,
}

impl NodeInfo {
    /// Create a new node snapshot
    pub fn new(node: Node, pod_count: usize) -> Self {
        Self { node, pod_count }
    }

    /// Node name ("unknown" if the metadata carries none)
    pub fn name(&self) -> &str {
        self.node.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Whether the node is marked unschedulable
    pub fn unschedulable(&self) -> bool {
        self.node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false)
    }
}

/// A committed (pod, node) assignment.
///
/// Immutable and authoritative once the cluster store accepts the bind;
/// the engine never revisits a committed binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Name of the bound pod
    pub pod_name: String,
    /// Name of the chosen node
    pub node_name: String,
    /// When the decision was committed
    pub decided_at: DateTime<Utc>,
}

impl Binding {
    /// Create a binding stamped with the current time
    pub fn new(pod_name: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            pod_name: pod_name.into(),
            node_name: node_name.into(),
            decided_at: Utc::now(),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pod_name, self.node_name)
    }
}
