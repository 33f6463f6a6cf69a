//! Shared test utilities for Kiln.
//!
//! This crate provides in-memory stand-ins for every external collaborator:
//! - [`MemorySnapshotRepo`]: snapshot registry
//! - [`MemoryCluster`]: compute cluster with job/task state controls
//! - [`MemoryObjectStore`]: artifact store with fake signed URLs
//! - [`MemorySourceFeed`]: paged commit history
//! - [`ManualClock`]: clock that only moves when told to
//! - Fixture helpers for commit metadata

// Fakes use unwrap on their own mutexes; a poisoned lock means a test already panicked.
#![allow(clippy::unwrap_used)]

pub mod clock;
pub mod cluster;
pub mod fixtures;
pub mod registry;
pub mod source;
pub mod storage;

pub use clock::ManualClock;
pub use cluster::MemoryCluster;
pub use fixtures::*;
pub use registry::MemorySnapshotRepo;
pub use source::MemorySourceFeed;
pub use storage::MemoryObjectStore;
