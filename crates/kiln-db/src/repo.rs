//! Repository traits and implementations.

pub mod snapshot;

pub use snapshot::{PgSnapshotRepo, SnapshotRecord, SnapshotRepo};
