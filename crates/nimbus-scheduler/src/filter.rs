use crate::types::FilterResult;
use nimbus_core::{NodeInfo, Pod};

/// Admission plugin trait.
///
/// A filter is a pure function of (pod, node); it must not keep
/// decision-relevant state between invocations.
pub trait FilterPlugin: Send + Sync {
    /// Decide whether the node can host the pod
    fn filter(&self, pod: &Pod, node: &NodeInfo) -> FilterResult;

    /// Name of the filter plugin
    fn name(&self) -> &'static str;
}

/// Rejects nodes marked unschedulable in their spec
pub struct NodeUnschedulable;

impl FilterPlugin for NodeUnschedulable {
    fn filter(&self, _pod: &Pod, node: &NodeInfo) -> FilterResult {
        if node.unschedulable() {
            FilterResult::fail(node.name(), "node is unschedulable")
        } else {
            FilterResult::pass(node.name())
        }
    }

    fn name(&self) -> &'static str {
        "NodeUnschedulable"
    }
}
