//! Nimbus Cluster - In-memory cluster state store
//!
//! This crate provides:
//! - The node/pod object store the engine schedules against
//! - A broadcast change feed consumed by the engine's event bridge
//! - The binding write that commits scheduling decisions
//!
//! It stands in for an external cluster store; the scheduling core only
//! ever talks to it through the `ClusterClient` contract.

pub mod store;

// Re-export commonly used types
pub use store::{ClusterState, ClusterStateConfig};
