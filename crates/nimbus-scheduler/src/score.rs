use crate::types::ScoreResult;
use nimbus_core::{NodeInfo, Pod};
use tracing::debug;

/// Ranking plugin trait.
///
/// Only consulted for nodes that passed every admission plugin. Scores
/// are in 0-100; the cycle sums the scores of all registered plugins.
pub trait ScorePlugin: Send + Sync {
    /// Score a feasible node for the pod (0-100, higher is better)
    fn score(&self, pod: &Pod, node: &NodeInfo) -> ScoreResult;

    /// Name of the score plugin
    fn name(&self) -> &'static str;
}

/// Prefers nodes with fewer pods already bound to them.
///
/// An empty node scores 100; the score falls off with the inverse of the
/// pod count (3 pods -> 25), spreading work across the cluster.
pub struct LeastPods;

impl ScorePlugin for LeastPods {
    fn score(&self, _pod: &Pod, node: &NodeInfo) -> ScoreResult {
        let score = 100 / (node.pod_count as i64 + 1);

        debug!(
            "Node {} least-pods score: {} ({} pods bound)",
            node.name(),
            score,
            node.pod_count
        );

        ScoreResult::new(node.name(), score)
    }

    fn name(&self) -> &'static str {
        "LeastPods"
    }
}
