use crate::bridge::run_bridge;
use crate::error::Result;
use crate::queue::{BackoffPolicy, QueueItemStatus, QueuedPod, SchedulingQueue};
use crate::registry::{PluginRegistry, PluginSet};
use nimbus_core::{ClusterClient, NodeInfo, Pod};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure reason stamped when no node passes admission
pub const REASON_NO_FEASIBLE_NODE: &str = "no feasible node";
/// Failure reason stamped when the binding commit fails
pub const REASON_BIND_FAILED: &str = "bind failed";

/// Configuration for the scheduler engine
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Retry backoff applied to failed items
    pub backoff: BackoffPolicy,
    /// Interval between backoff sweeps of the unschedulable partition
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// The scheduling engine.
///
/// Owns the scheduling queue and the plugin registry; talks to the
/// cluster through the injected `ClusterClient`. One scheduling cycle
/// runs at a time; producers (the event bridge, `submit`) feed the queue
/// concurrently.
pub struct Scheduler {
    queue: Arc<SchedulingQueue>,
    cluster: Arc<dyn ClusterClient>,
    registry: PluginRegistry,
    config: SchedulerConfig,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a new engine; fails fast if the plugin set cannot be built
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        plugins: &PluginSet,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let registry = PluginRegistry::from_set(plugins)?;
        Ok(Self::with_registry(cluster, registry, config))
    }

    /// Create a new engine from an already-built registry
    pub fn with_registry(
        cluster: Arc<dyn ClusterClient>,
        registry: PluginRegistry,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue: Arc::new(SchedulingQueue::new(config.backoff)),
            cluster,
            registry,
            config,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the engine: scheduling loop, backoff sweeper, event bridge.
    ///
    /// Calling `start` on a running engine is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return;
        }

        info!("Starting scheduler engine");
        let events = self.cluster.subscribe();
        tasks.push(tokio::spawn(self.clone().run_loop()));
        tasks.push(tokio::spawn(self.clone().run_sweeper()));
        tasks.push(tokio::spawn(run_bridge(
            self.queue.clone(),
            events,
            self.cancel.clone(),
        )));
    }

    /// Shut down the engine and wait for the in-flight cycle to drain.
    ///
    /// Idempotent; no new items are admitted once shutdown begins.
    pub async fn shutdown(&self) {
        info!("Shutting down scheduler engine");
        self.cancel.cancel();
        self.queue.shutdown();

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Submit a pod for scheduling, outside the event feed
    pub fn submit(&self, pod: Pod) -> Result<()> {
        self.queue.add(pod)
    }

    /// Operator view of every pending item and its last failure reason
    pub fn queue_statuses(&self) -> Vec<QueueItemStatus> {
        self.queue.statuses()
    }

    async fn run_loop(self: Arc<Self>) {
        info!("Scheduling loop started");
        while let Some(item) = self.queue.pop().await {
            self.schedule_one(item).await;
        }
        info!("Scheduling loop stopped");
    }

    async fn run_sweeper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let moved = self.queue.move_expired_to_active();
                    if moved > 0 {
                        debug!("Backoff sweep re-admitted {} items", moved);
                    }
                }
            }
        }
    }

    /// Run one scheduling cycle for a popped item.
    ///
    /// Every outcome is either a committed binding or a requeue; nothing
    /// here escalates into a process-level failure.
    async fn schedule_one(&self, item: QueuedPod) {
        debug!("Scheduling pod {} (attempt {})", item.name, item.attempts);

        let nodes = match self.cluster.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Node listing failed for pod {}: {}", item.name, e);
                self.queue.add_unschedulable(item, "node listing failed");
                return;
            }
        };

        let feasible = self.feasible_nodes(&item.pod, &nodes);
        if feasible.is_empty() {
            info!(
                "Pod {} is unschedulable: no feasible node among {}",
                item.name,
                nodes.len()
            );
            self.queue.add_unschedulable(item, REASON_NO_FEASIBLE_NODE);
            return;
        }

        let Some(chosen) = self.select_node(&item.pod, &feasible) else {
            self.queue.add_unschedulable(item, REASON_NO_FEASIBLE_NODE);
            return;
        };
        let node_name = chosen.name().to_string();

        match self.cluster.bind(&item.name, &node_name).await {
            Ok(binding) => {
                info!(
                    "Bound pod {} to node {} on attempt {}",
                    binding.pod_name, binding.node_name, item.attempts
                );
                self.queue.finish(&item);
            }
            Err(e) => {
                warn!(
                    "Failed to bind pod {} to node {}: {}",
                    item.name, node_name, e
                );
                self.queue.add_unschedulable(item, REASON_BIND_FAILED);
            }
        }
    }

    /// Nodes where every admission plugin admits the pod
    fn feasible_nodes<'a>(&self, pod: &Pod, nodes: &'a [NodeInfo]) -> Vec<&'a NodeInfo> {
        nodes.iter().filter(|node| self.admit(pod, node)).collect()
    }

    /// Run admission plugins in registered order, short-circuiting on the
    /// first rejection; later plugins are not consulted for that node.
    fn admit(&self, pod: &Pod, node: &NodeInfo) -> bool {
        for plugin in self.registry.filters() {
            let result = plugin.filter(pod, node);
            if !result.passed {
                debug!(
                    "Node {} rejected by {}: {}",
                    node.name(),
                    plugin.name(),
                    result.reason.unwrap_or_default()
                );
                return false;
            }
        }
        true
    }

    /// Sum the scores of all ranking plugins per node and pick the
    /// highest; exact ties break on the lexicographically smaller node
    /// name so repeated runs over identical input are reproducible.
    fn select_node<'a>(&self, pod: &Pod, feasible: &[&'a NodeInfo]) -> Option<&'a NodeInfo> {
        let mut scored: Vec<(i64, &NodeInfo)> = feasible
            .iter()
            .map(|node| {
                let total: i64 = self
                    .registry
                    .scorers()
                    .iter()
                    .map(|scorer| scorer.score(pod, node).score)
                    .sum();
                (total, *node)
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name().cmp(b.1.name())));

        let (score, node) = scored.first()?;
        debug!("Selected node {} with score {}", node.name(), score);
        Some(node)
    }
}
