use miette::Diagnostic;
use nimbus_core::ClusterError;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// A declared plugin could not be constructed; fatal at startup
    #[error("Failed to initialize plugin {plugin}: {reason}")]
    #[diagnostic(
        code(scheduler::plugin_init),
        help("The engine must not start partially configured; fix the plugin set")
    )]
    PluginInit { plugin: String, reason: String },

    /// No node passed the admission plugins
    #[error("No feasible node for pod {pod_name}")]
    #[diagnostic(
        code(scheduler::no_feasible_node),
        help("Check node schedulability and the pod's admission constraints")
    )]
    NoFeasibleNode { pod_name: String },

    /// The binding commit was rejected or errored
    #[error("Failed to bind pod {pod_name} to node {node_name}")]
    #[diagnostic(
        code(scheduler::bind_failed),
        help("Transient by design; the pod is requeued with backoff")
    )]
    BindFailed {
        pod_name: String,
        node_name: String,
        #[source]
        source: ClusterError,
    },

    /// An item with this identifier is already queued
    #[error("Pod {name} is already queued")]
    #[diagnostic(
        code(scheduler::already_queued),
        help("Duplicate submissions are rejected; the queued item is unaffected")
    )]
    AlreadyQueued { name: String },

    /// The queue refused the operation because shutdown has begun
    #[error("Scheduling queue is shut down")]
    #[diagnostic(
        code(scheduler::queue_shutdown),
        help("No new items are admitted after shutdown begins")
    )]
    QueueShutdown,

    /// Cluster state error
    #[error("Cluster error: {0}")]
    #[diagnostic(
        code(scheduler::cluster_error),
        help("Check the cluster state store")
    )]
    Cluster(#[from] ClusterError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a PluginInit error
    pub fn plugin_init(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginInit {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create a NoFeasibleNode error
    pub fn no_feasible_node(pod_name: impl Into<String>) -> Self {
        Self::NoFeasibleNode {
            pod_name: pod_name.into(),
        }
    }

    /// Create a BindFailed error
    pub fn bind_failed(
        pod_name: impl Into<String>,
        node_name: impl Into<String>,
        source: ClusterError,
    ) -> Self {
        Self::BindFailed {
            pod_name: pod_name.into(),
            node_name: node_name.into(),
            source,
        }
    }

    /// Create an AlreadyQueued error
    pub fn already_queued(name: impl Into<String>) -> Self {
        Self::AlreadyQueued { name: name.into() }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
