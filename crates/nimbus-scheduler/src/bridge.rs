use crate::error::SchedulerError;
use crate::queue::SchedulingQueue;
use nimbus_core::ClusterEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Translate cluster change events into queue operations.
///
/// Runs until the feed closes or the engine is cancelled. Feed order is
/// preserved; a lagged receiver is logged and survived, since the cycle
/// re-snapshots the node set at the start of every attempt anyway.
pub(crate) async fn run_bridge(
    queue: Arc<SchedulingQueue>,
    mut events: broadcast::Receiver<ClusterEvent>,
    cancel: CancellationToken,
) {
    info!("Event bridge started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => handle_event(&queue, event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event bridge lagged, {} events dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Cluster event feed closed");
                    break;
                }
            },
        }
    }

    info!("Event bridge stopped");
}

/// Apply one cluster event to the queue
pub(crate) fn handle_event(queue: &SchedulingQueue, event: ClusterEvent) {
    match event {
        // A new or changed node may unlock previously infeasible work.
        // Moving everything trades wasted re-evaluation for never missing
        // an opportunity.
        ClusterEvent::NodeAdded(node) | ClusterEvent::NodeUpdated(node) => {
            let moved = queue.move_all_to_active(|_| true);
            debug!(
                "Node {} changed; re-admitted {} unschedulable items",
                node.metadata.name.as_deref().unwrap_or("unknown"),
                moved
            );
        }
        // Feasibility only shrinks when a node goes away; nothing to requeue
        ClusterEvent::NodeRemoved(name) => {
            debug!("Node {} removed", name);
        }
        ClusterEvent::PodAdded(pod) | ClusterEvent::PodUpdated(pod) => {
            let bound = pod
                .spec
                .as_ref()
                .and_then(|s| s.node_name.as_deref())
                .is_some();
            if bound {
                return;
            }
            let name = pod.metadata.name.clone().unwrap_or_default();
            match queue.add(pod) {
                Ok(()) => {}
                Err(SchedulerError::AlreadyQueued { .. }) => {
                    // At-least-once delivery; the queued item wins
                    debug!("Pod {} already queued", name);
                }
                Err(SchedulerError::QueueShutdown) => {
                    debug!("Dropping pod {}; queue is shut down", name);
                }
                Err(e) => warn!("Failed to enqueue pod {}: {}", name, e),
            }
        }
        ClusterEvent::PodRemoved(name) => {
            if queue.remove(&name) {
                debug!("Pod {} removed from queue", name);
            }
        }
    }
}
