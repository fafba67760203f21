//! Nimbus Core - Fundamental types and contracts for the Nimbus scheduler
//!
//! This crate provides:
//! - Cluster object snapshots (`NodeInfo`) and binding records
//! - The `ClusterClient` contract between the engine and the state store
//! - Cluster change events consumed by the engine's event bridge
//! - Error types with miette diagnostics

pub mod cluster;
pub mod error;
pub mod events;
pub mod types;

// Re-export commonly used types
pub use cluster::ClusterClient;
pub use error::{ClusterError, Result};
pub use events::ClusterEvent;
pub use types::{Binding, NodeInfo};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
