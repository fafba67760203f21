use async_trait::async_trait;
use nimbus_core::{Binding, ClusterClient, ClusterError, ClusterEvent, Node, NodeInfo, Pod, Result};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Configuration for the cluster state store
#[derive(Debug, Clone)]
pub struct ClusterStateConfig {
    /// Capacity of the change-feed broadcast channel
    pub event_capacity: usize,
}

impl Default for ClusterStateConfig {
    fn default() -> Self {
        Self {
            event_capacity: 4096,
        }
    }
}

/// In-memory cluster state: nodes, pods, and a change feed.
///
/// Mutations emit a `ClusterEvent` on the broadcast feed after the write
/// completes, so subscribers observe changes in commit order.
pub struct ClusterState {
    nodes: RwLock<HashMap<String, Node>>,
    pods: RwLock<HashMap<String, Pod>>,
    event_tx: broadcast::Sender<ClusterEvent>,
}

impl ClusterState {
    /// Create an empty cluster state
    pub fn new(config: ClusterStateConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            nodes: RwLock::new(HashMap::new()),
            pods: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    fn emit(&self, event: ClusterEvent) {
        // A send error only means there are no subscribers right now
        let _ = self.event_tx.send(event);
    }

    fn name_of(metadata_name: &Option<String>, kind: &'static str) -> Result<String> {
        metadata_name
            .clone()
            .ok_or_else(|| ClusterError::invalid_object(format!("{} has no name", kind)))
    }

    /// Register a new node
    pub async fn add_node(&self, node: Node) -> Result<()> {
        let name = Self::name_of(&node.metadata.name, "Node")?;

        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&name) {
            return Err(ClusterError::already_exists("Node", name));
        }
        nodes.insert(name.clone(), node.clone());
        drop(nodes);

        debug!("Node {} added", name);
        self.emit(ClusterEvent::NodeAdded(node));
        Ok(())
    }

    /// Replace an existing node
    pub async fn update_node(&self, node: Node) -> Result<()> {
        let name = Self::name_of(&node.metadata.name, "Node")?;

        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(&name) {
            return Err(ClusterError::node_not_found(name));
        }
        nodes.insert(name.clone(), node.clone());
        drop(nodes);

        debug!("Node {} updated", name);
        self.emit(ClusterEvent::NodeUpdated(node));
        Ok(())
    }

    /// Remove a node
    pub async fn remove_node(&self, name: &str) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        if nodes.remove(name).is_none() {
            return Err(ClusterError::node_not_found(name));
        }
        drop(nodes);

        debug!("Node {} removed", name);
        self.emit(ClusterEvent::NodeRemoved(name.to_string()));
        Ok(())
    }

    /// Get a node by name
    pub async fn get_node(&self, name: &str) -> Result<Node> {
        self.nodes
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::node_not_found(name))
    }

    /// Create a new pod
    pub async fn add_pod(&self, pod: Pod) -> Result<()> {
        let name = Self::name_of(&pod.metadata.name, "Pod")?;

        let mut pods = self.pods.write().await;
        if pods.contains_key(&name) {
            return Err(ClusterError::already_exists("Pod", name));
        }
        pods.insert(name.clone(), pod.clone());
        drop(pods);

        debug!("Pod {} added", name);
        self.emit(ClusterEvent::PodAdded(pod));
        Ok(())
    }

    /// Remove a pod
    pub async fn remove_pod(&self, name: &str) -> Result<()> {
        let mut pods = self.pods.write().await;
        if pods.remove(name).is_none() {
            return Err(ClusterError::pod_not_found(name));
        }
        drop(pods);

        debug!("Pod {} removed", name);
        self.emit(ClusterEvent::PodRemoved(name.to_string()));
        Ok(())
    }

    /// Get a pod by name
    pub async fn get_pod(&self, name: &str) -> Result<Pod> {
        self.pods
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::pod_not_found(name))
    }

    /// List all pods
    pub async fn list_pods(&self) -> Vec<Pod> {
        self.pods.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ClusterClient for ClusterState {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let nodes = self.nodes.read().await;
        let pods = self.pods.read().await;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for pod in pods.values() {
            if let Some(node_name) = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) {
                *counts.entry(node_name).or_default() += 1;
            }
        }

        let mut infos: Vec<NodeInfo> = nodes
            .iter()
            .map(|(name, node)| NodeInfo::new(node.clone(), counts.get(name.as_str()).copied().unwrap_or(0)))
            .collect();

        // Stable listing order keeps cycle logs and tests reproducible
        infos.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(infos)
    }

    async fn bind(&self, pod_name: &str, node_name: &str) -> Result<Binding> {
        let nodes = self.nodes.read().await;
        if !nodes.contains_key(node_name) {
            return Err(ClusterError::node_not_found(node_name));
        }
        drop(nodes);

        let mut pods = self.pods.write().await;
        let pod = pods
            .get_mut(pod_name)
            .ok_or_else(|| ClusterError::pod_not_found(pod_name))?;

        if let Some(bound) = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) {
            return Err(ClusterError::already_bound(pod_name, bound));
        }

        pod.spec
            .get_or_insert_with(Default::default)
            .node_name = Some(node_name.to_string());
        let updated = pod.clone();
        drop(pods);

        debug!("Pod {} bound to node {}", pod_name, node_name);
        self.emit(ClusterEvent::PodUpdated(updated));
        Ok(Binding::new(pod_name, node_name))
    }

    fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_node(name: &str, unschedulable: bool) -> Node {
        let mut node = Node::default();
        node.metadata.name = Some(name.to_string());
        node.spec = Some(Default::default());
        node.spec.as_mut().unwrap().unschedulable = Some(unschedulable);
        node
    }

    fn make_test_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some(name.to_string());
        pod.spec = Some(Default::default());
        pod.spec.as_mut().unwrap().containers = vec![Default::default()];
        pod
    }

    #[tokio::test]
    async fn test_add_node_rejects_duplicate() {
        let state = ClusterState::new(ClusterStateConfig::default());
        state.add_node(make_test_node("node-1", false)).await.unwrap();

        let err = state
            .add_node(make_test_node("node-1", false))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_node_requires_existing() {
        let state = ClusterState::new(ClusterStateConfig::default());
        let err = state
            .update_node(make_test_node("node-1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_nodes_counts_bound_pods() {
        let state = ClusterState::new(ClusterStateConfig::default());
        state.add_node(make_test_node("node-1", false)).await.unwrap();
        state.add_node(make_test_node("node-2", false)).await.unwrap();

        for i in 0..3 {
            let mut pod = make_test_pod(&format!("pod-{}", i));
            pod.spec.as_mut().unwrap().node_name = Some("node-1".to_string());
            state.add_pod(pod).await.unwrap();
        }
        state.add_pod(make_test_pod("pending")).await.unwrap();

        let infos = state.list_nodes().await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name(), "node-1");
        assert_eq!(infos[0].pod_count, 3);
        assert_eq!(infos[1].name(), "node-2");
        assert_eq!(infos[1].pod_count, 0);
    }

    #[tokio::test]
    async fn test_bind_updates_pod_and_emits_event() {
        let state = ClusterState::new(ClusterStateConfig::default());
        state.add_node(make_test_node("node-1", false)).await.unwrap();
        state.add_pod(make_test_pod("nginx")).await.unwrap();

        let mut rx = state.subscribe();

        let binding = state.bind("nginx", "node-1").await.unwrap();
        assert_eq!(binding.pod_name, "nginx");
        assert_eq!(binding.node_name, "node-1");

        let bound = state.get_pod("nginx").await.unwrap();
        assert_eq!(
            bound.spec.as_ref().unwrap().node_name.as_deref(),
            Some("node-1")
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "PodUpdated");
        assert_eq!(event.object_name(), Some("nginx"));
    }

    #[tokio::test]
    async fn test_bind_fails_for_missing_node() {
        let state = ClusterState::new(ClusterStateConfig::default());
        state.add_pod(make_test_pod("nginx")).await.unwrap();

        let err = state.bind("nginx", "node-1").await.unwrap_err();
        assert!(matches!(err, ClusterError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_bind_is_write_once() {
        let state = ClusterState::new(ClusterStateConfig::default());
        state.add_node(make_test_node("node-1", false)).await.unwrap();
        state.add_node(make_test_node("node-2", false)).await.unwrap();
        state.add_pod(make_test_pod("nginx")).await.unwrap();

        state.bind("nginx", "node-1").await.unwrap();
        let err = state.bind("nginx", "node-2").await.unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyBound { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_receives_mutation_events_in_order() {
        let state = ClusterState::new(ClusterStateConfig::default());
        let mut rx = state.subscribe();

        state.add_node(make_test_node("node-1", false)).await.unwrap();
        state.add_pod(make_test_pod("nginx")).await.unwrap();
        state.remove_pod("nginx").await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind(), "NodeAdded");
        assert_eq!(rx.recv().await.unwrap().kind(), "PodAdded");
        assert_eq!(rx.recv().await.unwrap().kind(), "PodRemoved");
    }
}
