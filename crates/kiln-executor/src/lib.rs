//! Compute cluster backends for Kiln.
//!
//! Provides the Batch REST client that submits build jobs and reads their
//! state back.

pub mod batch;

pub use batch::{BatchCluster, BatchClusterConfig};
pub use kiln_core::cluster::{ComputeCluster, Job, JobState, JobSubmission, Pool, Task, TaskState};
