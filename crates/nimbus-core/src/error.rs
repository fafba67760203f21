use miette::Diagnostic;
use thiserror::Error;

/// Error type for cluster state operations
#[derive(Error, Debug, Diagnostic)]
pub enum ClusterError {
    /// Node not found
    #[error("Node not found: {name}")]
    #[diagnostic(
        code(nimbus::node_not_found),
        help("Verify the node name; it may have been removed from the cluster")
    )]
    NodeNotFound { name: String },

    /// Pod not found
    #[error("Pod not found: {name}")]
    #[diagnostic(
        code(nimbus::pod_not_found),
        help("Verify the pod name; it may have been removed from the cluster")
    )]
    PodNotFound { name: String },

    /// Pod already bound to a node
    #[error("Pod {pod} is already bound to node {node}")]
    #[diagnostic(
        code(nimbus::already_bound),
        help("A committed binding is immutable; the engine never revisits it")
    )]
    AlreadyBound { pod: String, node: String },

    /// Object already exists
    #[error("{kind} already exists: {name}")]
    #[diagnostic(
        code(nimbus::already_exists),
        help("Use the update entry point to replace an existing object")
    )]
    AlreadyExists { kind: &'static str, name: String },

    /// Invalid object (e.g. missing metadata.name)
    #[error("Invalid object: {reason}")]
    #[diagnostic(
        code(nimbus::invalid_object),
        help("Ensure metadata.name is set before submitting the object")
    )]
    InvalidObject { reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(nimbus::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal { message: String },
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    /// Create a NodeNotFound error
    pub fn node_not_found(name: impl Into<String>) -> Self {
        Self::NodeNotFound { name: name.into() }
    }

    /// Create a PodNotFound error
    pub fn pod_not_found(name: impl Into<String>) -> Self {
        Self::PodNotFound { name: name.into() }
    }

    /// Create an AlreadyBound error
    pub fn already_bound(pod: impl Into<String>, node: impl Into<String>) -> Self {
        Self::AlreadyBound {
            pod: pod.into(),
            node: node.into(),
        }
    }

    /// Create an AlreadyExists error
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Create an InvalidObject error
    pub fn invalid_object(reason: impl Into<String>) -> Self {
        Self::InvalidObject {
            reason: reason.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
