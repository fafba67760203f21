use crate::error::Result;
use crate::events::ClusterEvent;
use crate::types::{Binding, NodeInfo};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Contract between the scheduling engine and the cluster state store.
///
/// The store is the system of record: `bind` success or failure is the
/// single source of truth for whether an assignment was committed.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Snapshot the current node set, including per-node pod counts
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    /// Persist the (pod, node) assignment in the state store
    async fn bind(&self, pod_name: &str, node_name: &str) -> Result<Binding>;

    /// Subscribe to the cluster change feed
    fn subscribe(&self) -> broadcast::Receiver<ClusterEvent>;
}
