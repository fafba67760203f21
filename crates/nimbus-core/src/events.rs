use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};

/// A cluster state change emitted by the state store on mutations.
///
/// Delivery is at-least-once and ordered per entity; removal events carry
/// only the object name since the object itself is already gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClusterEvent {
    NodeAdded(Node),
    NodeUpdated(Node),
    NodeRemoved(String),
    PodAdded(Pod),
    PodUpdated(Pod),
    PodRemoved(String),
}

impl ClusterEvent {
    /// Short event kind label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterEvent::NodeAdded(_) => "NodeAdded",
            ClusterEvent::NodeUpdated(_) => "NodeUpdated",
            ClusterEvent::NodeRemoved(_) => "NodeRemoved",
            ClusterEvent::PodAdded(_) => "PodAdded",
            ClusterEvent::PodUpdated(_) => "PodUpdated",
            ClusterEvent::PodRemoved(_) => "PodRemoved",
        }
    }

    /// Name of the affected object, if it carries one
    pub fn object_name(&self) -> Option<&str> {
        match self {
            ClusterEvent::NodeAdded(n) | ClusterEvent::NodeUpdated(n) => {
                n.metadata.name.as_deref()
            }
            ClusterEvent::PodAdded(p) | ClusterEvent::PodUpdated(p) => p.metadata.name.as_deref(),
            ClusterEvent::NodeRemoved(name) | ClusterEvent::PodRemoved(name) => Some(name),
        }
    }
}
