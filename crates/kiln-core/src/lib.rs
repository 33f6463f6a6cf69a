//! Core domain types and traits for Kiln.
//!
//! This crate contains:
//! - The snapshot model and commit metadata
//! - Build job identifiers and callback secrets
//! - Gateway traits for the source feed, compute cluster and object store
//! - The shared error type

pub mod artifact;
pub mod clock;
pub mod cluster;
pub mod error;
pub mod id;
pub mod secret;
pub mod snapshot;
pub mod source;

pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use id::JobId;
pub use secret::CallbackSecret;
pub use snapshot::{CommitInfo, RefreshTarget, Snapshot};

/// Header the report task sets on its callback request.
pub const CALLBACK_EVENT_HEADER: &str = "X-Kiln-Event";
/// Event value marking a build completion callback.
pub const BUILD_COMPLETED_EVENT: &str = "build-completed";

/// Path of the completion callback endpoint for a commit.
///
/// The report task posts here; the API router mounts the handler on the same
/// shape, so both sides go through this function.
pub fn callback_path(commit_id: &str) -> String {
    format!("/api/snapshot/{commit_id}")
}
