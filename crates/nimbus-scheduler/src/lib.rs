//! Nimbus Scheduler - Pod to Node scheduling engine
//!
//! This crate provides:
//! - The scheduling queue (active / unschedulable partitions, retry backoff)
//! - The per-item scheduling cycle (filter, score, select, bind)
//! - The plugin registry with typed filter and score capability lists
//! - The event bridge from cluster changes to queue operations

mod bridge;

pub mod error;
pub mod filter;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod score;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use filter::{FilterPlugin, NodeUnschedulable};
pub use queue::{BackoffPolicy, QueueItemStatus, QueuePartition, QueuedPod, SchedulingQueue};
pub use registry::{PluginRegistry, PluginSet};
pub use scheduler::{Scheduler, SchedulerConfig, REASON_BIND_FAILED, REASON_NO_FEASIBLE_NODE};
pub use score::{LeastPods, ScorePlugin};
pub use types::{FilterResult, ScoreResult};
